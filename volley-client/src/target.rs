use http::StatusCode;

/// What every worker requests, and the status that counts as a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: String,
    success_status: StatusCode,
}

impl Target {
    pub fn new<S: Into<String>>(url: S, success_status: StatusCode) -> Target {
        Target {
            url: url.into(),
            success_status,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_success(&self, status: StatusCode) -> bool {
        status == self.success_status
    }
}
