//! Renders a [`LoadTestConfig`] into a k6 JavaScript test.

use std::collections::BTreeMap;

use super::{LoadTestConfig, ScriptResult};

const DEFAULT_SCENARIO: &str = "k6_scenario";
const DEFAULT_URL: &str = "https://k6.io";
const DEFAULT_DURATION: &str = "1m";
const DEFAULT_STAGE_DURATION: &str = "30s";

/// Render `config` into a runnable script.
pub fn build_script(config: &LoadTestConfig) -> ScriptResult {
    let method = normalize_method(&config.http_method);
    let scenario = scenario_name(&config.test_name);
    let file_name = format!("{scenario}.js");

    ScriptResult {
        script: render(config, method, &scenario),
        command: format!("k6 run {file_name}"),
        suggested_file_name: file_name,
    }
}

/// Turn a free-form test name into a k6 scenario identifier.
///
/// Runs of characters outside `[A-Za-z0-9_-]` collapse to `_`, edge
/// underscores are trimmed, a leading digit gets an `s_` prefix and the
/// result is lowercased.
pub fn scenario_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
            sanitized.push(c);
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }
    }

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        return DEFAULT_SCENARIO.into();
    }

    let prefixed = if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("s_{trimmed}")
    } else {
        trimmed.to_string()
    };
    prefixed.to_lowercase()
}

fn normalize_method(method: &str) -> &'static str {
    match method.trim().to_uppercase().as_str() {
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        _ => "GET",
    }
}

fn requires_payload(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH")
}

fn request_line(method: &str) -> &'static str {
    match method {
        "POST" => "http.post(url, payload, params)",
        "PUT" => "http.put(url, payload, params)",
        "PATCH" => "http.patch(url, payload, params)",
        "DELETE" => "http.del(url, params)",
        _ => "http.get(url, params)",
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn to_json(map: &BTreeMap<String, String>) -> String {
    // A string map always serializes.
    serde_json::to_string(map).unwrap_or_else(|_| "{}".into())
}

fn non_empty(map: Option<&BTreeMap<String, String>>) -> Option<&BTreeMap<String, String>> {
    map.filter(|m| !m.is_empty())
}

/// Script text built one line at a time.
#[derive(Default)]
struct Lines(String);

impl Lines {
    fn line(&mut self, text: impl AsRef<str>) {
        self.0.push_str(text.as_ref());
        self.0.push('\n');
    }

    fn blank(&mut self) {
        self.0.push('\n');
    }
}

fn render(config: &LoadTestConfig, method: &str, scenario: &str) -> String {
    let mut s = Lines::default();

    s.line("import http from 'k6/http';");
    s.line("import { check, sleep } from 'k6';");
    s.blank();
    s.line("export const options = {");
    s.line("  scenarios: {");
    s.line(format!("    '{scenario}': {{"));

    if config.stages.is_empty() {
        let duration = or_default(&config.duration, DEFAULT_DURATION);
        let vus = config.virtual_users.max(1);
        s.line("      executor: 'constant-vus',");
        s.line(format!("      vus: {vus},"));
        s.line(format!("      duration: '{duration}',"));
    } else {
        s.line("      executor: 'ramping-vus',");
        s.line("      stages: [");
        for stage in &config.stages {
            let duration = or_default(&stage.duration, DEFAULT_STAGE_DURATION);
            let target = stage.target.max(0);
            s.line(format!("        {{ duration: '{duration}', target: {target} }},"));
        }
        s.line("      ],");
    }

    if let Some(tags) = non_empty(config.tags.as_ref()) {
        s.line(format!("      tags: {},", to_json(tags)));
    }

    s.line("    },");
    s.line("  },");

    if let Some(threshold) = config.p95_threshold_ms.filter(|ms| *ms > 0) {
        s.line("  thresholds: {");
        s.line(format!("    http_req_duration: ['p(95)<{threshold}'],"));
        s.line("  },");
    }

    s.line("};");
    s.blank();

    let url = or_default(&config.target_url, DEFAULT_URL).replace('\'', "\\'");
    s.line(format!("const url = '{url}';"));
    s.blank();
    s.line("export default function () {");

    match non_empty(config.headers.as_ref()) {
        Some(headers) => {
            s.line(format!("  const params = {{ headers: {} }};", to_json(headers)));
        }
        None => s.line("  const params = {};"),
    }
    s.blank();

    if requires_payload(method) {
        match config.payload.as_deref().filter(|p| !p.trim().is_empty()) {
            None => {
                s.line("  const payload = ''; // Provide a payload when using POST, PUT or PATCH");
            }
            Some(payload) => {
                let escaped = payload.replace("\r\n", "\n").replace('`', "\\`");
                s.line("  const payload = `");
                for line in escaped.split('\n') {
                    s.line(format!("  {line}"));
                }
                s.line("  `;");
            }
        }
        s.blank();
    }

    s.line(format!("  const response = {};", request_line(method)));

    if config.check_response {
        s.line("  check(response, {");
        s.line("    'status is 200': (r) => r.status === 200,");
        s.line("  });");
    }

    let sleep_seconds = config.sleep_seconds.max(0);
    if sleep_seconds > 0 {
        s.line(format!("  sleep({sleep_seconds});"));
    }
    s.line("}");

    s.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Stage;

    fn config() -> LoadTestConfig {
        LoadTestConfig::default()
    }

    #[test]
    fn test_constant_vus_without_stages() {
        let result = build_script(&LoadTestConfig {
            test_name: "smoke".into(),
            virtual_users: 25,
            duration: "2m".into(),
            ..config()
        });

        assert_eq!(result.suggested_file_name, "smoke.js");
        assert_eq!(result.command, "k6 run smoke.js");
        assert!(result.script.contains("executor: 'constant-vus'"));
        assert!(result.script.contains("vus: 25"));
        assert!(result.script.contains("duration: '2m'"));
        assert!(result.script.contains("http.get(url, params)"));
        assert!(!result.script.contains("ramping-vus"));
    }

    #[test]
    fn test_default_config_renders_full_script() {
        let expected = "\
import http from 'k6/http';
import { check, sleep } from 'k6';

export const options = {
  scenarios: {
    'sample_test': {
      executor: 'constant-vus',
      vus: 10,
      duration: '1m',
    },
  },
};

const url = 'https://test.k6.io';

export default function () {
  const params = {};

  const response = http.get(url, params);
  check(response, {
    'status is 200': (r) => r.status === 200,
  });
  sleep(1);
}
";
        assert_eq!(build_script(&LoadTestConfig::default()).script, expected);
    }

    #[test]
    fn test_ramping_vus_with_stages() {
        let script = build_script(&LoadTestConfig {
            stages: vec![
                Stage { duration: "30s".into(), target: 5 },
                Stage { duration: "1m".into(), target: 20 },
                Stage { duration: "  ".into(), target: -3 },
            ],
            ..config()
        })
        .script;

        assert!(script.contains("executor: 'ramping-vus'"));
        assert!(script.contains("{ duration: '30s', target: 5 },"));
        assert!(script.contains("{ duration: '1m', target: 20 },"));
        assert!(script.contains("{ duration: '30s', target: 0 },"));
        assert!(!script.contains("vus: "));
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!(scenario_name("123 Homepage Load"), "s_123_homepage_load");
        assert_eq!(scenario_name("test@#$name"), "test_name");
        assert_eq!(scenario_name("  "), DEFAULT_SCENARIO);
        assert_eq!(scenario_name("@#$%"), DEFAULT_SCENARIO);
        assert_eq!(scenario_name("Api-Smoke_v2"), "api-smoke_v2");

        let result = build_script(&LoadTestConfig {
            test_name: "123 homepage load".into(),
            ..config()
        });
        assert_eq!(result.suggested_file_name, "s_123_homepage_load.js");
        assert!(result.script.contains("'s_123_homepage_load'"));
        assert_eq!(result.command, "k6 run s_123_homepage_load.js");
    }

    #[test]
    fn test_unknown_method_falls_back_to_get() {
        let script = build_script(&LoadTestConfig {
            http_method: "TRACE".into(),
            ..config()
        })
        .script;
        assert!(script.contains("http.get(url, params)"));
        assert!(!script.contains("payload"));
    }

    #[test]
    fn test_headers_tags_thresholds_and_payload() {
        let script = build_script(&LoadTestConfig {
            http_method: " post ".into(),
            headers: Some(BTreeMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )])),
            tags: Some(BTreeMap::from([(
                "environment".to_string(),
                "test".to_string(),
            )])),
            p95_threshold_ms: Some(500),
            payload: Some("{\"name\":\"k6\"}".into()),
            ..config()
        })
        .script;

        assert!(script.contains("tags: {\"environment\":\"test\"},"));
        assert!(script.contains("http_req_duration: ['p(95)<500']"));
        assert!(script.contains("http.post(url, payload, params)"));
        assert!(script.contains("const payload = `"));
        assert!(script.contains("const params = { headers: {\"Content-Type\":\"application/json\"} };"));
    }

    #[test]
    fn test_empty_maps_and_non_positive_thresholds_are_omitted() {
        for threshold in [Some(0), Some(-5), None] {
            let script = build_script(&LoadTestConfig {
                headers: Some(BTreeMap::new()),
                tags: Some(BTreeMap::new()),
                p95_threshold_ms: threshold,
                ..config()
            })
            .script;
            assert!(script.contains("const params = {};"));
            assert!(!script.contains("tags:"));
            assert!(!script.contains("thresholds:"));
        }
    }

    #[test]
    fn test_post_without_payload_gets_placeholder() {
        let script = build_script(&LoadTestConfig {
            http_method: "POST".into(),
            payload: Some("   ".into()),
            ..config()
        })
        .script;
        assert!(script
            .contains("const payload = ''; // Provide a payload when using POST, PUT or PATCH"));
        assert!(script.contains("http.post(url, payload, params)"));
    }

    #[test]
    fn test_put_patch_delete_calls() {
        let put = build_script(&LoadTestConfig {
            http_method: "put".into(),
            payload: Some("x".into()),
            ..config()
        })
        .script;
        assert!(put.contains("http.put(url, payload, params)"));

        let patch = build_script(&LoadTestConfig {
            http_method: "Patch".into(),
            ..config()
        })
        .script;
        assert!(patch.contains("http.patch(url, payload, params)"));

        let delete = build_script(&LoadTestConfig {
            http_method: "delete".into(),
            payload: Some("ignored".into()),
            ..config()
        })
        .script;
        assert!(delete.contains("http.del(url, params)"));
        assert!(!delete.contains("payload"));
    }

    #[test]
    fn test_sleep_and_check_toggles() {
        let script = build_script(&LoadTestConfig {
            sleep_seconds: 3,
            check_response: false,
            ..config()
        })
        .script;
        assert!(script.contains("sleep(3);"));
        assert!(!script.contains("status is 200"));

        let script = build_script(&LoadTestConfig {
            sleep_seconds: -1,
            ..config()
        })
        .script;
        assert!(!script.contains("sleep("));
        assert!(script.contains("'status is 200'"));
    }

    #[test]
    fn test_escapes_url_quotes_and_payload_backticks() {
        let script = build_script(&LoadTestConfig {
            target_url: "https://api.example.com/product?id=42&name=Bob's Burger".into(),
            http_method: "POST".into(),
            payload: Some("line1\r\nline`2".into()),
            ..config()
        })
        .script;
        assert!(script
            .contains("const url = 'https://api.example.com/product?id=42&name=Bob\\'s Burger';"));
        assert!(script.contains("  line1\n  line\\`2\n  `;"));
    }

    #[test]
    fn test_blank_url_duration_and_vus_use_defaults() {
        let script = build_script(&LoadTestConfig {
            target_url: " ".into(),
            duration: "\t".into(),
            virtual_users: 0,
            ..config()
        })
        .script;
        assert!(script.contains("const url = 'https://k6.io';"));
        assert!(script.contains("duration: '1m'"));
        assert!(script.contains("vus: 1,"));
    }
}
