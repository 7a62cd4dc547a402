use std::fmt::Write as _;

use indexmap::IndexSet;

use crate::gateway::route::Method;

/// Request-time rules applied by the gateway before forwarding to the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPolicy {
    pub allowed_origins: IndexSet<String>,
    pub allowed_methods: IndexSet<Method>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub rewrite: String,
    pub backend_id: String,
}

impl InboundPolicy {
    /// A policy with no CORS origins that rewrites to `rewrite` and
    /// forwards to `backend_id`.
    #[must_use]
    pub fn new(rewrite: &str, backend_id: &str) -> Self {
        Self {
            allowed_origins: IndexSet::new(),
            allowed_methods: IndexSet::new(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: true,
            rewrite: rewrite.to_string(),
            backend_id: backend_id.to_string(),
        }
    }

    /// Add origins in discovery order. Duplicates and trailing slashes
    /// are dropped.
    #[must_use]
    pub fn origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for origin in origins {
            let origin = origin.as_ref().trim_end_matches('/');
            if !origin.is_empty() {
                self.allowed_origins.insert(origin.to_string());
            }
        }
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.allowed_methods.insert(method);
        self
    }

    /// Render the gateway policy document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<policies>\n");
        out.push_str("    <inbound>\n");
        out.push_str("        <base />\n");

        if !self.allowed_origins.is_empty() {
            let _ = writeln!(
                out,
                "        <cors allow-credentials=\"{}\">",
                self.allow_credentials
            );
            out.push_str("            <allowed-origins>\n");
            for origin in &self.allowed_origins {
                let _ = writeln!(out, "                <origin>{}</origin>", escape(origin));
            }
            out.push_str("            </allowed-origins>\n");
            out.push_str("            <allowed-methods>");
            for method in &self.allowed_methods {
                let _ = write!(out, "<method>{method}</method>");
            }
            out.push_str("</allowed-methods>\n");
            out.push_str("            <allowed-headers>");
            for header in &self.allowed_headers {
                let _ = write!(out, "<header>{}</header>", escape(header));
            }
            out.push_str("</allowed-headers>\n");
            out.push_str("        </cors>\n");
        }

        let _ = writeln!(
            out,
            "        <rewrite-uri template=\"{}\" />",
            escape(&self.rewrite)
        );
        let _ = writeln!(
            out,
            "        <set-backend-service id=\"apim-generated-policy\" backend-id=\"{}\" />",
            escape(&self.backend_id)
        );
        out.push_str("    </inbound>\n");
        out.push_str("    <backend>\n        <forward-request />\n    </backend>\n");
        out.push_str("    <outbound>\n        <base />\n    </outbound>\n");
        out.push_str("    <on-error>\n        <base />\n    </on-error>\n");
        out.push_str("</policies>\n");
        out
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
