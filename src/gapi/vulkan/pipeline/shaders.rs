//! GLSL sources used by the pipeline helpers, compiled to SPIR-V at runtime.
//!
//! Compiled words are cached for the whole process, keyed by source text and stage, so a run
//! of one-shot tests compiles each trivial shader once.

use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::errors::HarnessError;
use anyhow::Context;
use lazy_static::lazy_static;
use log::{debug, trace};
use parking_lot::Mutex;
use shaderc::{CompileOptions, Compiler, EnvVersion, ShaderKind, TargetEnv};
use std::collections::HashMap;
use std::sync::Arc;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

pub const BINDSTATE_VERT_SHADER: &str = "#version 450
void main() {
   gl_Position = vec4(1);
}
";

pub const BINDSTATE_FRAG_SHADER: &str = "#version 450
layout(location = 0) out vec4 uFragColor;
void main(){
   uFragColor = vec4(0,1,0,1);
}
";

pub const BINDSTATE_MINIMAL_SHADER: &str = "#version 450
void main() {}
";

pub const RAYGEN_SHADER: &str = "#version 460
#extension GL_NV_ray_tracing : require
layout(set = 0, binding = 0, rgba8) uniform image2D image;
layout(set = 0, binding = 1) uniform accelerationStructureNV as;
layout(location = 0) rayPayloadNV float payload;
void main()
{
   vec4 col = vec4(0, 0, 0, 1);
   vec3 origin = vec3(float(gl_LaunchIDNV.x)/float(gl_LaunchSizeNV.x), float(gl_LaunchIDNV.y)/float(gl_LaunchSizeNV.y), 1.0);
   vec3 dir = vec3(0.0, 0.0, -1.0);
   payload = 0.5;
   traceNV(as, gl_RayFlagsCullBackFacingTrianglesNV, 0xff, 0, 1, 0, origin, 0.0, dir, 1000.0, 0);
   col.y = payload;
   imageStore(image, ivec2(gl_LaunchIDNV.xy), col);
}
";

pub const CLOSEST_HIT_SHADER: &str = "#version 460
#extension GL_NV_ray_tracing : require
layout(location = 0) rayPayloadInNV float hitValue;
void main() {
    hitValue = 1.0;
}
";

pub const MISS_SHADER: &str = "#version 460
#extension GL_NV_ray_tracing : require
layout(location = 0) rayPayloadInNV float hitValue;
void main() {
    hitValue = 0.0;
}
";

/// Entry point name handed to every stage, NUL-terminated.
const ENTRY_POINT: &[u8] = b"main\0";

type CacheKey = (String, u32);

lazy_static! {
    static ref SPIRV_CACHE: Mutex<HashMap<CacheKey, Arc<[u32]>>> = Mutex::new(HashMap::new());
}

fn shader_kind(stage: vk::ShaderStageFlags) -> Option<ShaderKind> {
    [
        (vk::ShaderStageFlags::VERTEX, ShaderKind::Vertex),
        (vk::ShaderStageFlags::FRAGMENT, ShaderKind::Fragment),
        (vk::ShaderStageFlags::COMPUTE, ShaderKind::Compute),
        (vk::ShaderStageFlags::GEOMETRY, ShaderKind::Geometry),
        (vk::ShaderStageFlags::TESSELLATION_CONTROL, ShaderKind::TessControl),
        (vk::ShaderStageFlags::TESSELLATION_EVALUATION, ShaderKind::TessEvaluation),
        (vk::ShaderStageFlags::RAYGEN_KHR, ShaderKind::RayGeneration),
        (vk::ShaderStageFlags::CLOSEST_HIT_KHR, ShaderKind::ClosestHit),
        (vk::ShaderStageFlags::MISS_KHR, ShaderKind::Miss),
        (vk::ShaderStageFlags::ANY_HIT_KHR, ShaderKind::AnyHit),
        (vk::ShaderStageFlags::INTERSECTION_KHR, ShaderKind::Intersection),
        (vk::ShaderStageFlags::CALLABLE_KHR, ShaderKind::Callable),
    ]
    .into_iter()
    .find(|(flags, _)| *flags == stage)
    .map(|(_, kind)| kind)
}

fn compile_error(stage: vk::ShaderStageFlags, message: impl Into<String>) -> HarnessError {
    HarnessError::ShaderCompile {
        stage,
        message: message.into(),
    }
}

/// Compiles `source` for `stage`, or returns the words compiled earlier for the same pair.
pub fn compile_glsl(source: &str, stage: vk::ShaderStageFlags) -> Result<Arc<[u32]>, HarnessError> {
    let key = (source.to_owned(), stage.bits());
    let mut cache = SPIRV_CACHE.lock();
    if let Some(words) = cache.get(&key) {
        trace!("SPIR-V cache hit for {stage:?} shader");
        return Ok(Arc::clone(words));
    }

    let kind = shader_kind(stage).ok_or_else(|| compile_error(stage, "unsupported stage"))?;
    let compiler = Compiler::new()
        .map_err(|err| compile_error(stage, format!("failed to create GLSL compiler: {err}")))?;
    let mut options = CompileOptions::new().map_err(|err| {
        compile_error(stage, format!("failed to initialize compile options: {err}"))
    })?;
    options.set_target_env(TargetEnv::Vulkan, EnvVersion::Vulkan1_1 as u32);

    let artifact = compiler
        .compile_into_spirv(source, kind, "inline.glsl", "main", Some(&options))
        .map_err(|err| compile_error(stage, err.to_string()))?;
    let words: Arc<[u32]> = Arc::from(artifact.as_binary());
    debug!("Compiled {stage:?} shader into {} SPIR-V words", words.len());
    cache.insert(key, Arc::clone(&words));
    Ok(words)
}

/// A shader module that destroys itself when dropped.
pub struct ShaderObject<'a> {
    device: &'a dyn DeviceDispatch,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl<'a> ShaderObject<'a> {
    pub fn new(
        device: &'a dyn DeviceDispatch,
        source: &str,
        stage: vk::ShaderStageFlags,
    ) -> anyhow::Result<Self> {
        let words = compile_glsl(source, stage)?;
        Self::from_spirv(device, &words, stage)
    }

    pub fn from_spirv(
        device: &'a dyn DeviceDispatch,
        words: &[u32],
        stage: vk::ShaderStageFlags,
    ) -> anyhow::Result<Self> {
        let info = vk::ShaderModuleCreateInfo::builder()
            .code_size(std::mem::size_of_val(words))
            .code(words)
            .build();
        let module = device
            .create_shader_module(&info)
            .with_context(|| format!("Failed to create {stage:?} shader module"))?;
        Ok(Self {
            device,
            module,
            stage,
        })
    }

    pub fn get_vk(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderObject<'_> {
    fn drop(&mut self) {
        self.device.destroy_shader_module(self.module);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pipeline_stage_has_a_compiler_kind() {
        for stage in [
            vk::ShaderStageFlags::VERTEX,
            vk::ShaderStageFlags::FRAGMENT,
            vk::ShaderStageFlags::COMPUTE,
            vk::ShaderStageFlags::RAYGEN_KHR,
            vk::ShaderStageFlags::CLOSEST_HIT_KHR,
            vk::ShaderStageFlags::MISS_KHR,
        ] {
            assert!(shader_kind(stage).is_some(), "{stage:?}");
        }
        assert!(shader_kind(vk::ShaderStageFlags::ALL_GRAPHICS).is_none());
    }

    #[test]
    fn combined_stage_masks_are_rejected_before_compiling() {
        let err = compile_glsl(BINDSTATE_MINIMAL_SHADER, vk::ShaderStageFlags::ALL).unwrap_err();
        assert!(matches!(err, HarnessError::ShaderCompile { .. }));
    }
}
