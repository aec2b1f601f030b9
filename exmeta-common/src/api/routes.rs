//! Remote endpoint construction
//!
//! All URLs are derived from a single base URL. Three endpoints are used:
//! - `GET  {base}/Account/Login?returnUrl=...` (browser-navigated)
//! - `GET  {base}/api/auth/get-user-display-name` (bearer)
//! - `POST {base}/api/exe-lookup/upload-metadata-batch` (bearer, JSON array body)

/// Base URL used by debug builds (local development server)
pub const DEBUG_BASE_URL: &str = "https://localhost:5597";

/// Base URL used by release builds
pub const RELEASE_BASE_URL: &str = "https://defkey.com";

/// Host name placed in the loopback return URL handed to the browser
pub const CALLBACK_HOST: &str = "localhost";

const LOGIN_PATH: &str = "/Account/Login";
const DISPLAY_NAME_PATH: &str = "/api/auth/get-user-display-name";
const UPLOAD_BATCH_PATH: &str = "/api/exe-lookup/upload-metadata-batch";

/// Route builder bound to one base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    base_url: String,
}

impl ApiRoutes {
    /// Create routes for `base_url`; trailing slashes are dropped
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// Routes for the compiled-in default server
    ///
    /// Debug builds talk to the local development server, release builds
    /// to the public site.
    pub fn compiled_default() -> Self {
        if cfg!(debug_assertions) {
            Self::new(DEBUG_BASE_URL)
        } else {
            Self::new(RELEASE_BASE_URL)
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Loopback URL the browser is redirected to after login
    pub fn callback_url(port: u16) -> String {
        format!("http://{}:{}", CALLBACK_HOST, port)
    }

    /// Browser login page with the percent-encoded loopback return URL
    ///
    /// # Examples
    ///
    /// ```
    /// use exmeta_common::api::ApiRoutes;
    ///
    /// let routes = ApiRoutes::new("https://example.test/");
    /// assert_eq!(
    ///     routes.login_url(8080),
    ///     "https://example.test/Account/Login?returnUrl=http%3A%2F%2Flocalhost%3A8080"
    /// );
    /// ```
    pub fn login_url(&self, callback_port: u16) -> String {
        let return_url = Self::callback_url(callback_port);
        format!(
            "{}{}?returnUrl={}",
            self.base_url,
            LOGIN_PATH,
            urlencoding::encode(&return_url)
        )
    }

    pub fn display_name_url(&self) -> String {
        format!("{}{}", self.base_url, DISPLAY_NAME_PATH)
    }

    pub fn upload_batch_url(&self) -> String {
        format!("{}{}", self.base_url, UPLOAD_BATCH_PATH)
    }
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self::compiled_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let routes = ApiRoutes::new("https://example.test///");
        assert_eq!(routes.base_url(), "https://example.test");
        assert_eq!(
            routes.display_name_url(),
            "https://example.test/api/auth/get-user-display-name"
        );
    }

    #[test]
    fn test_upload_batch_url() {
        let routes = ApiRoutes::new("http://127.0.0.1:9000");
        assert_eq!(
            routes.upload_batch_url(),
            "http://127.0.0.1:9000/api/exe-lookup/upload-metadata-batch"
        );
    }

    #[test]
    fn test_login_url_encodes_return_url() {
        let routes = ApiRoutes::new("https://defkey.com");
        let url = routes.login_url(49152);
        assert!(url.starts_with("https://defkey.com/Account/Login?returnUrl="));
        assert!(url.ends_with("http%3A%2F%2Flocalhost%3A49152"));
    }

    #[test]
    fn test_compiled_default_matches_build_profile() {
        let routes = ApiRoutes::compiled_default();
        if cfg!(debug_assertions) {
            assert_eq!(routes.base_url(), DEBUG_BASE_URL);
        } else {
            assert_eq!(routes.base_url(), RELEASE_BASE_URL);
        }
    }
}
