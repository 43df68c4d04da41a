//! `gourmet init`: generate a starter configuration file.
//!
//! Creates a YAML, JSON, or TOML config file with either minimal
//! or fully documented templates.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::GourmetError;

pub fn execute(args: &InitArgs) -> Result<(), GourmetError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("gourmet.{}", args.format.extension())));

    if output.exists() {
        return Err(GourmetError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# Gourmet config
#
# Routes are tried in order; the first pattern matching the whole
# request path wins.

routes:
  - pattern: "/api/.*"
    servers:
      - url: "http://localhost:8080"
      - url: "http://localhost:8081"
"#;

const YAML_FULL: &str = r#"# Gourmet config
#
# All values shown are defaults. Uncomment and modify as needed.

# Global defaults applied to all routes unless overridden
defaults:
  # timeout: 5000              # Upstream timeout in ms
  # forward_headers: true      # Forward client headers upstream
  # proxy_headers: true        # Add X-Forwarded-*, Via headers
  # strip_hop_by_hop: true     # Strip Connection, TE, etc.
  # max_fails: 3               # Failures before a server leaves rotation (0 = never)
  # fail_timeout: 10000        # How long a failed server stays out, in ms
  # headers:
  #   add: {}                  # Headers to add to all forwarded requests
  #   strip: []                # Headers to remove from all forwarded requests

routes:
  # Patterns are regular expressions anchored to the whole path.
  - pattern: "/api/.*"
    servers:
      - url: "http://localhost:8080"
        weight: 3              # Receives three requests per rotation
      - url: "http://localhost:8081"

  # Full: all options shown
  # - pattern: "/static/[a-z0-9_-]+\\.(css|js)"
  #   timeout: 10000                   # Override default for this route
  #   headers:
  #     add:
  #       X-Source: "gourmet"
  #     strip: ["Cookie"]
  #   servers:
  #     - url: "http://cdn-a:8080"
  #       weight: 2
  #       timeout: 8000                # Override route timeout
  #       max_fails: 5
  #       fail_timeout: 30000
  #     - url: "http://cdn-b:8080"

  # Catch-all: keep it last
  # - pattern: ".*"
  #   servers:
  #     - url: "http://fallback:8080"
"#;

const JSON_MINIMAL: &str = r#"{
  "routes": [
    {
      "pattern": "/api/.*",
      "servers": [
        { "url": "http://localhost:8080" },
        { "url": "http://localhost:8081" }
      ]
    }
  ]
}
"#;

const JSON_FULL: &str = r#"{
  "defaults": {
    "timeout": 5000,
    "forward_headers": true,
    "proxy_headers": true,
    "strip_hop_by_hop": true,
    "max_fails": 3,
    "fail_timeout": 10000,
    "headers": {
      "add": {},
      "strip": []
    }
  },
  "routes": [
    {
      "pattern": "/api/.*",
      "servers": [
        { "url": "http://localhost:8080", "weight": 3 },
        { "url": "http://localhost:8081", "weight": 1 }
      ]
    }
  ]
}
"#;

const TOML_MINIMAL: &str = r#"# Gourmet config

[[routes]]
pattern = "/api/.*"

[[routes.servers]]
url = "http://localhost:8080"

[[routes.servers]]
url = "http://localhost:8081"
"#;

const TOML_FULL: &str = r#"# Gourmet config
#
# All values shown are defaults. Uncomment and modify as needed.

[defaults]
# timeout = 5000
# forward_headers = true
# proxy_headers = true
# strip_hop_by_hop = true
# max_fails = 3
# fail_timeout = 10000

# [defaults.headers]
# add = {}
# strip = []

[[routes]]
pattern = "/api/.*"
# timeout = 5000

[[routes.servers]]
url = "http://localhost:8080"
weight = 3
# timeout = 5000
# max_fails = 3
# fail_timeout = 10000

[[routes.servers]]
url = "http://localhost:8081"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::parse_config_str;
    use crate::config::validation;

    fn check(ext: &str, content: &str) {
        let config = parse_config_str(ext, content, "template").unwrap();
        assert!(validation::validate(&config).is_ok());
        assert_eq!(config.total_servers(), 2);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_templates_are_valid() {
        check("yaml", template(&ConfigFormat::Yaml, false));
        check("yaml", template(&ConfigFormat::Yaml, true));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_templates_are_valid() {
        check("json", template(&ConfigFormat::Json, false));
        check("json", template(&ConfigFormat::Json, true));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn toml_templates_are_valid() {
        check("toml", template(&ConfigFormat::Toml, false));
        check("toml", template(&ConfigFormat::Toml, true));
    }

    #[test]
    fn refuses_to_overwrite() {
        let path = std::env::temp_dir().join(format!("gourmet-init-{}.yaml", std::process::id()));
        std::fs::write(&path, "routes: []\n").unwrap();
        let args = InitArgs {
            format: ConfigFormat::Yaml,
            output: Some(path.clone()),
            full: false,
        };
        let result = execute(&args);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(GourmetError::FileExists { .. })));
    }
}
