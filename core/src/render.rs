//! Turns a frozen call into the request a transport sends.
//!
//! The target only executes GET, POST, PUT, DELETE and HEAD natively, so a
//! PATCH goes out as a POST carrying `_HttpMethod=PATCH` in its query. This
//! is the only place the remap happens; the descriptor itself still says
//! PATCH.

use tracing::debug;

use crate::descriptor::{encode_pair, join_query, FrozenCall};
use crate::http::{HttpMethod, HttpRequest};

pub const DEFAULT_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "application/json"),
    ("Accept", "application/json"),
];

/// Query parameter that carries a tunnelled method.
pub const METHOD_OVERRIDE_PARAM: &str = "_HttpMethod";

/// Render `call` into a wire request.
///
/// Caller headers replace defaults with exactly the same name. The caller's
/// query is passed through as is; only the tunnel parameter is encoded here.
pub fn render(call: &FrozenCall) -> HttpRequest {
    let desc = call.descriptor();

    let caller_query = desc.query().strip_prefix('?').unwrap_or(desc.query());

    let (method, query) = match desc.method() {
        HttpMethod::Patch => {
            let tunnel = encode_pair(METHOD_OVERRIDE_PARAM, HttpMethod::Patch.as_str());
            let query = if caller_query.split('&').any(|pair| pair == tunnel) {
                caller_query.to_string()
            } else {
                join_query(caller_query, &tunnel)
            };
            (HttpMethod::Post, query)
        }
        other => (other, caller_query.to_string()),
    };

    let path = if query.is_empty() {
        desc.path().to_string()
    } else {
        format!("{}?{query}", desc.path())
    };

    let request = HttpRequest {
        method,
        path,
        headers: merge_headers(desc.headers()),
        body: (!desc.body().is_empty()).then(|| desc.body().to_string()),
        timeout_ms: desc.timeout_ms(),
        endpoint_key: desc.endpoint_key().to_string(),
    };
    debug!(
        endpoint_key = %request.endpoint_key,
        method = %request.method,
        path = %request.path,
        "rendered request"
    );
    request
}

/// Defaults first, with caller values substituted in place on an exact name
/// match, then the remaining caller headers in their own order.
fn merge_headers(custom: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = DEFAULT_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (name, value) in custom {
        match merged.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.clone(),
            None => merged.push((name.clone(), value.clone())),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CallDescriptor;

    fn rendered(desc: CallDescriptor) -> HttpRequest {
        render(&desc.freeze().unwrap())
    }

    fn count(req: &HttpRequest, name: &str) -> usize {
        req.headers.iter().filter(|(k, _)| k == name).count()
    }

    #[test]
    fn patch_becomes_post_with_tunnel_param() {
        let req = rendered(CallDescriptor::new(
            "Acme",
            HttpMethod::Patch,
            "/users/1",
            "",
            r#"{"name":"Bob"}"#,
        ));
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "/users/1?_HttpMethod=PATCH");
        assert_eq!(req.body.as_deref(), Some(r#"{"name":"Bob"}"#));
    }

    #[test]
    fn patch_tunnel_joins_existing_query() {
        let req = rendered(CallDescriptor::new("Acme", HttpMethod::Patch, "/users/1", "a=1&b=2", ""));
        assert_eq!(req.path, "/users/1?a=1&b=2&_HttpMethod=PATCH");
    }

    #[test]
    fn patch_tunnel_is_never_duplicated() {
        let req = rendered(CallDescriptor::new(
            "Acme",
            HttpMethod::Patch,
            "/users/1",
            "_HttpMethod=PATCH",
            "",
        ));
        assert_eq!(req.query().matches("_HttpMethod=PATCH").count(), 1);
    }

    #[test]
    fn remap_does_not_touch_the_descriptor() {
        let frozen = CallDescriptor::new("Acme", HttpMethod::Patch, "/users/1", "", "")
            .freeze()
            .unwrap();
        let _ = render(&frozen);
        assert_eq!(frozen.descriptor().method(), HttpMethod::Patch);
        assert_eq!(frozen.descriptor().query(), "");
    }

    #[test]
    fn head_and_other_methods_pass_through() {
        for method in [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Head,
        ] {
            let req = rendered(CallDescriptor::new("Acme", method, "/x", "", ""));
            assert_eq!(req.method, method);
            assert_eq!(req.path, "/x");
        }
    }

    #[test]
    fn caller_query_is_not_reencoded() {
        let req = rendered(CallDescriptor::new("Acme", HttpMethod::Get, "/search", "q=a%20b", ""));
        assert_eq!(req.path, "/search?q=a%20b");
    }

    #[test]
    fn defaults_are_present_without_overrides() {
        let req = rendered(CallDescriptor::new("Acme", HttpMethod::Get, "/x", "", ""));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("Accept"), Some("application/json"));
        assert_eq!(req.headers.len(), 2);
    }

    #[test]
    fn caller_content_type_replaces_default() {
        let req = rendered(
            CallDescriptor::new("Acme", HttpMethod::Post, "/x", "", "a=1")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_header("X-Trace", "t1"),
        );
        assert_eq!(count(&req, "Content-Type"), 1);
        assert_eq!(req.header("Content-Type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.header("Accept"), Some("application/json"));
        assert_eq!(req.headers.last(), Some(&("X-Trace".to_string(), "t1".to_string())));
    }

    #[test]
    fn differently_cased_header_is_kept_separately() {
        let req = rendered(
            CallDescriptor::new("Acme", HttpMethod::Get, "/x", "", "")
                .with_header("content-type", "text/plain"),
        );
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.headers.len(), 3);
    }

    #[test]
    fn empty_body_renders_as_none() {
        let req = rendered(CallDescriptor::new("Acme", HttpMethod::Delete, "/x", "", ""));
        assert!(req.body.is_none());
        assert_eq!(req.timeout_ms, crate::DEFAULT_TIMEOUT_MS);
        assert_eq!(req.endpoint_key, "Acme");
    }
}
