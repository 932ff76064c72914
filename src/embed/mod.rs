//! Embedded browser-side resources.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `instrument` - The registration wrapper spliced into JS functions
//! - `remote` - Scripts injected into live HTML pages (minified by build.rs)
//!
//! # Usage
//!
//! ```ignore
//! use embed::instrument::{FUNCTION_WRAPPER, WrapperVars};
//! use embed::remote::{TRANSPORT_CONFIG_JS, TransportVars};
//!
//! let wrapper = FUNCTION_WRAPPER.render(&WrapperVars { id: 3 });
//! let config = TRANSPORT_CONFIG_JS.render(&TransportVars { url: "ws://127.0.0.1:35730" });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod instrument {
    use super::{Template, TemplateVars};

    /// Variables for the function registration wrapper.
    pub struct WrapperVars {
        pub id: u32,
    }

    impl TemplateVars for WrapperVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__ID__", &self.id.to_string())
        }
    }

    /// Registration wrapper placed before a function's original statements.
    ///
    /// Inert unless `window.__LiveDev` holds a replacement body for the ID.
    pub const FUNCTION_WRAPPER: Template<WrapperVars> = Template::new(
        "var __ld$ = typeof __LiveDev === \"object\" && __LiveDev.lookup(__ID__); \
         if (__ld$) { return eval(__ld$); }",
    );
}

pub mod remote {
    use super::{Template, TemplateVars};

    /// WebSocket transport (defines `window.__LiveDevTransport`).
    pub const TRANSPORT_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/transport.min.js"));

    /// Message broker and protocol manager.
    pub const PROTOCOL_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/protocol.min.js"));

    /// Script/stylesheet relation observer.
    pub const DOCUMENT_OBSERVER_JS: &str =
        include_str!(concat!(env!("OUT_DIR"), "/document_observer.min.js"));

    /// Replacement-body registry (`window.__LiveDev`).
    pub const REGISTRY_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/registry.min.js"));

    /// Highlight helpers (`window._LD`), highlight.css inlined.
    pub const FUNCTIONS_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/functions.min.js"));

    /// Variables for the transport config object.
    pub struct TransportVars<'a> {
        pub url: &'a str,
    }

    impl TemplateVars for TransportVars<'_> {
        fn apply(&self, content: &str) -> String {
            let url = serde_json::to_string(self.url).unwrap_or_else(|_| "\"\"".into());
            content.replace("__LIVEDEV_WS_URL__", &url)
        }
    }

    pub const TRANSPORT_CONFIG_JS: Template<TransportVars<'static>> =
        Template::new("window.__LiveDevTransportConfig = { url: __LIVEDEV_WS_URL__ };");

    /// Variables for the document observer config object.
    pub struct ObserverVars {
        pub poll_interval_ms: u64,
        pub poll_attempts: u32,
    }

    impl TemplateVars for ObserverVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__LIVEDEV_POLL_INTERVAL__", &self.poll_interval_ms.to_string())
                .replace("__LIVEDEV_POLL_ATTEMPTS__", &self.poll_attempts.to_string())
        }
    }

    pub const OBSERVER_CONFIG_JS: Template<ObserverVars> = Template::new(
        "window.__LiveDevConfig = { pollInterval: __LIVEDEV_POLL_INTERVAL__, \
         pollAttempts: __LIVEDEV_POLL_ATTEMPTS__ };",
    );

    /// Wrap script source in a `<script>` element.
    pub fn script_tag(code: &str) -> String {
        // `</script` inside the code would end the element early
        format!("<script>\n{}\n</script>\n", code.replace("</script", "<\\/script"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_wrapper_with_id() {
        let rendered = instrument::FUNCTION_WRAPPER.render(&instrument::WrapperVars { id: 42 });
        assert!(rendered.contains("__LiveDev.lookup(42)"));
        assert!(!rendered.contains("__ID__"));
        assert!(rendered.contains("return eval(__ld$)"));
    }

    #[test]
    fn test_transport_config_escapes_url() {
        let vars = remote::TransportVars {
            url: "ws://127.0.0.1:35730/\"x\"",
        };
        let rendered = remote::TRANSPORT_CONFIG_JS.render(&vars);
        assert!(rendered.contains(r#"url: "ws://127.0.0.1:35730/\"x\"""#));
        assert!(!rendered.contains("__LIVEDEV_WS_URL__"));
    }

    #[test]
    fn test_observer_config() {
        let vars = remote::ObserverVars {
            poll_interval_ms: 50,
            poll_attempts: 100,
        };
        let rendered = remote::OBSERVER_CONFIG_JS.render(&vars);
        assert!(rendered.contains("pollInterval: 50"));
        assert!(rendered.contains("pollAttempts: 100"));
    }

    #[test]
    fn test_remote_scripts_embedded() {
        assert!(remote::REGISTRY_JS.contains("__LiveDev"));
        assert!(remote::FUNCTIONS_JS.contains("_LD"));
        assert!(!remote::FUNCTIONS_JS.contains("__LIVEDEV_HIGHLIGHT_CSS__"));
        assert!(remote::TRANSPORT_JS.contains("__LiveDevTransportConfig"));
    }

    #[test]
    fn test_script_tag_escapes_close_tag() {
        let tag = remote::script_tag("var s = \"</script>\";");
        assert!(tag.starts_with("<script>"));
        assert_eq!(tag.matches("</script").count(), 1);
    }
}
