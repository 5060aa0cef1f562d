/// Declares an enum whose variants each stand for one Vulkan extension or layer name.
///
/// Every variant gets a static name buffer so `name_ptr` can be handed to
/// `enabled_*_names` without worrying about temporaries.
#[macro_export]
macro_rules! vulkan_names {
    (
        $(#[$outer:meta])*
        $enum_vis:vis enum $name:ident {
            $(
                $(#[$inner:meta])*
                $variant:ident = $ext:expr,
            )+
        }
    ) => {
        $(#[$outer])*
        $enum_vis enum $name {
            $(
                $(#[$inner])*
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            #[inline]
            pub fn name_buf(self) -> &'static ::vulkanalia::vk::ExtensionName {
                match self {
                    $(
                        Self::$variant => {
                            static BUF: ::vulkanalia::vk::ExtensionName = $ext;
                            &BUF
                        }
                    )+
                }
            }

            /// NUL-terminated pointer for FFI.
            #[inline]
            pub fn name_ptr(self) -> *const ::std::ffi::c_char {
                self.name_buf().as_ptr() as *const ::std::ffi::c_char
            }

            #[inline]
            pub fn try_from_name(name: &::vulkanalia::vk::ExtensionName) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.name_buf() == name)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self.name_buf(), f)
            }
        }
    };
}
