//! Fixed table mapping REST-shaped requests to IPC commands.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TransportError;
use crate::model::{Method, RequestSpec};

/// How the request body reaches the command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BodyArg {
    Ignored,
    /// Forwarded whole as the `payload` argument.
    Payload,
    /// Object fields become top-level arguments.
    Spread,
}

struct Route {
    method: Method,
    pattern: Regex,
    command: &'static str,
    /// Argument receiving the numeric path segment, if the pattern has one.
    id_arg: Option<&'static str>,
    body: BodyArg,
}

fn route(
    method: Method,
    pattern: &str,
    command: &'static str,
    id_arg: Option<&'static str>,
    body: BodyArg,
) -> Route {
    Route {
        method,
        pattern: Regex::new(pattern).expect("route patterns are valid regexes"),
        command,
        id_arg,
        body,
    }
}

static ROUTES: Lazy<Vec<Route>> = Lazy::new(|| {
    use BodyArg::*;
    use Method::*;
    vec![
        route(Get, r"^/config$", "dq_get_config", None, Ignored),
        route(Get, r"^/providers$", "dq_get_config", None, Ignored),
        route(Post, r"^/providers$", "dq_create_provider", None, Payload),
        route(Put, r"^/providers/(\d+)$", "dq_update_provider", Some("id"), Payload),
        route(Delete, r"^/providers/(\d+)$", "dq_delete_provider", Some("id"), Ignored),
        route(Post, r"^/providers/(\d+)/select$", "dq_select_provider", Some("id"), Ignored),
        route(Get, r"^/chats$", "dq_list_chats", None, Ignored),
        route(Get, r"^/chats/(\d+)/messages$", "dq_get_chat_messages", Some("chatId"), Ignored),
        route(Put, r"^/chats/(\d+)$", "dq_rename_chat", Some("chatId"), Spread),
        route(Delete, r"^/chats/(\d+)$", "dq_delete_chat", Some("chatId"), Ignored),
        route(Post, r"^/chats/(\d+)/branch$", "dq_branch_chat", Some("chatId"), Payload),
        route(Get, r"^/models$", "dq_list_models", None, Ignored),
        route(Get, r"^/health$", "dq_health_check", None, Ignored),
        route(Post, r"^/health/preview$", "dq_health_check_preview", None, Payload),
    ]
});

/// A request resolved to a command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCommand {
    pub command: &'static str,
    pub args: serde_json::Value,
}

/// Converts `snake_case` wire keys to the host's `camelCase` argument names.
pub(crate) fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Resolves `spec` to a command and its argument object.
///
/// Query parameters become arguments (absent ones omitted), the numeric path
/// segment becomes an integer argument, and the body is forwarded per route.
pub fn resolve(spec: &RequestSpec) -> Result<RoutedCommand, TransportError> {
    let path = match spec.path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let (route, captures) = ROUTES
        .iter()
        .filter(|route| route.method == spec.method)
        .find_map(|route| route.pattern.captures(path).map(|caps| (route, caps)))
        .ok_or_else(|| TransportError::UnsupportedRoute {
            method: spec.method,
            path: spec.path.clone(),
        })?;

    let mut args = serde_json::Map::new();
    for (key, value) in spec.present_query() {
        args.insert(camel_case(key), value.to_json());
    }
    if let (Some(arg), Some(segment)) = (route.id_arg, captures.get(1)) {
        let id: i64 = segment.as_str().parse().map_err(|_| {
            TransportError::Invalid(format!("path id out of range: {}", segment.as_str()))
        })?;
        args.insert(arg.to_string(), serde_json::Value::from(id));
    }
    match (route.body, &spec.body) {
        (BodyArg::Payload, Some(body)) => {
            args.insert("payload".to_string(), body.clone());
        }
        (BodyArg::Spread, Some(serde_json::Value::Object(fields))) => {
            for (key, value) in fields {
                args.insert(key.clone(), value.clone());
            }
        }
        (BodyArg::Spread, Some(other)) => {
            args.insert("payload".to_string(), other.clone());
        }
        _ => {}
    }

    Ok(RoutedCommand {
        command: route.command,
        args: serde_json::Value::Object(args),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved(spec: RequestSpec) -> (&'static str, serde_json::Value) {
        let routed = resolve(&spec).expect("route");
        (routed.command, routed.args)
    }

    #[test]
    fn provider_routes_extract_typed_ids_and_payloads() {
        assert_eq!(
            resolved(RequestSpec::get("/providers")),
            ("dq_get_config", json!({}))
        );
        assert_eq!(
            resolved(RequestSpec::put("/providers/12").body(json!({"name":"n"}))),
            ("dq_update_provider", json!({"id": 12, "payload": {"name":"n"}}))
        );
        assert_eq!(
            resolved(RequestSpec::post("/providers/3/select")),
            ("dq_select_provider", json!({"id": 3}))
        );
        assert_eq!(
            resolved(RequestSpec::delete("/providers/4")),
            ("dq_delete_provider", json!({"id": 4}))
        );
    }

    #[test]
    fn chat_routes_use_chat_id_argument() {
        assert_eq!(
            resolved(RequestSpec::get("/chats/7/messages")),
            ("dq_get_chat_messages", json!({"chatId": 7}))
        );
        assert_eq!(
            resolved(RequestSpec::put("/chats/7").body(json!({"title":"Renamed"}))),
            ("dq_rename_chat", json!({"chatId": 7, "title": "Renamed"}))
        );
        assert_eq!(
            resolved(RequestSpec::post("/chats/7/branch").body(json!({"until_message_id": 3}))),
            (
                "dq_branch_chat",
                json!({"chatId": 7, "payload": {"until_message_id": 3}})
            )
        );
    }

    #[test]
    fn query_params_become_camel_case_args_and_absent_ones_are_dropped() {
        let spec = RequestSpec::get("/models")
            .query("provider_id", Some(5_i64))
            .query::<bool>("verbose_mode", None);
        assert_eq!(resolved(spec), ("dq_list_models", json!({"providerId": 5})));
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        assert_eq!(resolved(RequestSpec::get("/health/")).0, "dq_health_check");
    }

    #[test]
    fn unmapped_route_names_method_and_path() {
        let err = resolve(&RequestSpec::post("/chats")).expect_err("no POST /chats");
        assert_eq!(
            err,
            TransportError::UnsupportedRoute {
                method: Method::Post,
                path: "/chats".into()
            }
        );
        let text = resolve(&RequestSpec::get("/providers/abc"))
            .expect_err("non-numeric id")
            .to_string();
        assert!(text.contains("GET") && text.contains("/providers/abc"));
    }

    #[test]
    fn route_table_builds_with_anchored_patterns() {
        assert_eq!(ROUTES.len(), 14);
        for route in ROUTES.iter() {
            let pattern = route.pattern.as_str();
            assert!(pattern.starts_with("^/") && pattern.ends_with('$'), "{pattern}");
            assert_eq!(route.id_arg.is_some(), route.pattern.captures_len() == 2, "{pattern}");
        }
    }

    #[test]
    fn camel_case_handles_edge_cases() {
        assert_eq!(camel_case("provider_id"), "providerId");
        assert_eq!(camel_case("regen_message_id"), "regenMessageId");
        assert_eq!(camel_case("plain"), "plain");
        assert_eq!(camel_case("_leading"), "leading");
    }
}
