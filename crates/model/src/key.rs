/// Uniquely identifies a cached model handle: repo + device + compute type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub repo_id: String,
    pub device: String,
    pub compute_type: String,
}

impl ModelKey {
    pub fn new(repo_id: impl Into<String>, device: impl Into<String>, compute_type: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            device: device.into(),
            compute_type: compute_type.into(),
        }
    }

    /// Coerce `compute_type` into something the device actually supports,
    /// logging a warning when a silent substitution happens.
    pub fn coerced(mut self) -> Self {
        let compat = config::device_compute_compatibility();
        let Some(supported) = compat.get(self.device.as_str()) else {
            return self;
        };
        if !supported.contains(&self.compute_type.as_str()) {
            log::warn!(
                "compute_type '{}' unsupported on device '{}', coercing to '{}'",
                self.compute_type,
                self.device,
                supported[0]
            );
            self.compute_type = supported[0].to_string();
        }
        self
    }

    /// Local directory name for a downloaded model: `/` replaced with `-`.
    pub fn local_dir_name(&self) -> String {
        self.repo_id.replace('/', "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_compute_type_is_coerced() {
        let key = ModelKey::new("org/model", "cpu", "float16").coerced();
        assert_eq!(key.compute_type, "float32");
    }

    #[test]
    fn supported_compute_type_is_kept() {
        let key = ModelKey::new("org/model", "cpu", "int8").coerced();
        assert_eq!(key.compute_type, "int8");
    }

    #[test]
    fn local_dir_name_replaces_slash() {
        let key = ModelKey::new("org/model-name", "cpu", "int8");
        assert_eq!(key.local_dir_name(), "org-model-name");
    }
}
