//! Shared state handed to every HTTP handler.

use layerctl_telemetry::Metrics;

use crate::control::ControlPlane;

pub(crate) struct ApiState {
    pub(crate) control: ControlPlane,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) const fn new(control: ControlPlane, telemetry: Metrics) -> Self {
        Self { control, telemetry }
    }
}
