use std::fmt::Write;

use crate::proxy::ProxyRule;

/// Render an nginx `server` block for `rule`.
///
/// The original `Host` header and client address are forwarded so
/// the application sees the real caller.
#[must_use]
pub fn render(rule: &ProxyRule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "server {{");
    let _ = writeln!(out, "    listen {};", rule.listen);
    let _ = writeln!(out, "    listen [::]:{};", rule.listen);
    let _ = writeln!(out, "    server_name _;");
    let _ = writeln!(out);
    let _ = writeln!(out, "    location / {{");
    let _ = writeln!(out, "        proxy_pass http://{};", rule.upstream);
    let _ = writeln!(out, "        proxy_http_version 1.1;");
    let _ = writeln!(out, "        proxy_set_header Host $host;");
    let _ = writeln!(out, "        proxy_set_header X-Real-IP $remote_addr;");
    let _ = writeln!(
        out,
        "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"
    );
    let _ = writeln!(out, "        proxy_set_header X-Forwarded-Proto $scheme;");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}");
    out
}
