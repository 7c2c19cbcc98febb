use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<header::HeaderName>,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT],
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(origins: &[String]) -> Self {
        Self {
            allowed_origins: origins
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            ..Self::default()
        }
    }

    /// An empty origin list allows any origin. Bearer tokens travel in a
    /// header, so credentials mode is never enabled.
    pub fn build(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", o);
                    None
                }
            })
            .collect();

        let allow_origin = if origins.is_empty() {
            AllowOrigin::from(Any)
        } else {
            info!("CORS restricted to {} origin(s)", origins.len());
            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(self.allowed_methods)
            .allow_headers(self.allowed_headers)
            .max_age(Duration::from_secs(self.max_age_secs))
    }
}

pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    CorsConfig::with_origins(origins).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origins_are_trimmed() {
        let config = CorsConfig::with_origins(&[
            " https://pulse.example.com/ ".to_string(),
            String::new(),
        ]);
        assert_eq!(config.allowed_origins, vec!["https://pulse.example.com"]);
    }

    #[test]
    fn test_default_methods_cover_api() {
        let config = CorsConfig::default();
        assert!(config.allowed_methods.contains(&Method::PUT));
        assert!(config.allowed_methods.contains(&Method::DELETE));
    }
}
