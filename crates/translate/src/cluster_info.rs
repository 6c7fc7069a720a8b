/// Process-wide configuration the translation pipeline needs but that no
/// single source object carries — the controller's own identity and the
/// debounce knobs read from the environment by the binary.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    /// Matched against `GatewayClass.spec.controllerName`.
    pub controller_name: String,
    pub debounce_after: std::time::Duration,
    pub debounce_max: std::time::Duration,
}

impl ClusterInfo {
    pub fn new(controller_name: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
            debounce_after: std::time::Duration::from_millis(10),
            debounce_max: std::time::Duration::from_secs(1),
        }
    }
}
