//! Shared HTTP constants (headers, problem URIs).

pub(crate) const HEADER_ADMIN_KEY: &str = "x-admin-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://layerctl.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://layerctl.dev/problems/unauthorized";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://layerctl.dev/problems/bad-request";
pub(crate) const PROBLEM_UNKNOWN_LAYER: &str = "https://layerctl.dev/problems/unknown-layer";
pub(crate) const PROBLEM_MANDATORY_LAYER: &str = "https://layerctl.dev/problems/mandatory-layer";
pub(crate) const PROBLEM_THRESHOLD_OUT_OF_RANGE: &str =
    "https://layerctl.dev/problems/threshold-out-of-range";

/// Route prefix shared by every guarded endpoint.
pub(crate) const ADMIN_PREFIX: &str = "/admin/layers";
