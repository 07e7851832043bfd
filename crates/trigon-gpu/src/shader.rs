//! Shader loading.

use crate::error::{GpuError, Result};
use ash::vk;
use std::io::{Cursor, ErrorKind};
use std::path::Path;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Source of compiled shader bytecode.
pub trait ShaderLoader {
    /// Read SPIR-V bytecode.
    fn load_bytecode(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create a shader module from SPIR-V bytecode.
    ///
    /// # Safety
    /// The device must be valid.
    unsafe fn create_module(
        &self,
        device: &ash::Device,
        bytecode: &[u8],
    ) -> Result<vk::ShaderModule> {
        let words = spirv_words(bytecode)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        Ok(unsafe { device.create_shader_module(&create_info, None) }?)
    }
}

/// Loads shaders from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileShaderLoader;

impl ShaderLoader for FileShaderLoader {
    fn load_bytecode(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => GpuError::ShaderNotFound {
                path: path.to_path_buf(),
            },
            _ => GpuError::ShaderRead {
                path: path.to_path_buf(),
                source,
            },
        })
    }
}

/// Reinterpret bytecode as aligned SPIR-V words, checking the header.
pub fn spirv_words(bytecode: &[u8]) -> Result<Vec<u32>> {
    if bytecode.is_empty() || bytecode.len() % 4 != 0 {
        return Err(GpuError::InvalidShader(format!(
            "bytecode length {} is not a non-zero multiple of 4",
            bytecode.len()
        )));
    }

    let words = ash::util::read_spv(&mut Cursor::new(bytecode))
        .map_err(|e| GpuError::InvalidShader(e.to_string()))?;

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        _ => Err(GpuError::InvalidShader("missing SPIR-V magic number".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn header() -> Vec<u8> {
        [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }

    #[test]
    fn accepts_spirv_header() {
        let words = spirv_words(&header()).unwrap();
        assert_eq!(words[0], SPIRV_MAGIC);
        assert_eq!(words.len(), 5);
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = [0u8; 20];
        assert!(matches!(spirv_words(&bytes), Err(GpuError::InvalidShader(_))));
    }

    #[test]
    fn rejects_truncated_bytecode() {
        let mut bytes = header();
        bytes.pop();
        assert!(matches!(spirv_words(&bytes), Err(GpuError::InvalidShader(_))));
        assert!(matches!(spirv_words(&[]), Err(GpuError::InvalidShader(_))));
    }

    #[test]
    fn missing_file_is_not_found() {
        let path = PathBuf::from("no/such/dir/triangle.vert.spv");
        let err = FileShaderLoader.load_bytecode(&path).unwrap_err();
        assert!(matches!(err, GpuError::ShaderNotFound { path: p } if p == path));
    }

    #[test]
    fn reads_existing_file() {
        let path = std::env::temp_dir().join(format!("trigon-shader-{}.spv", std::process::id()));
        std::fs::write(&path, header()).unwrap();

        let bytes = FileShaderLoader.load_bytecode(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(bytes, header());
        assert!(spirv_words(&bytes).is_ok());
    }
}
