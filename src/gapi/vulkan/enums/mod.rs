mod enum_impl;
pub mod extensions;
pub mod layers;
