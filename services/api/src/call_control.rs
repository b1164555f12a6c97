//! The TwiML document returned to the telephony platform for an incoming call.

use crate::config::Config;

/// Tells the platform where to open the relay WebSocket and what to say first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallControlDocument {
    pub action_url: String,
    pub stream_url: String,
    pub welcome_greeting: String,
}

impl CallControlDocument {
    pub fn from_config(config: &Config) -> Self {
        Self {
            action_url: config.action_url.clone(),
            stream_url: config.stream_url.clone(),
            welcome_greeting: config.welcome_greeting.clone(),
        }
    }

    /// Renders the XML body. Attribute values are escaped.
    pub fn render(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect action="{}">
    <Voxray url="{}" welcomeGreeting="{}" />
  </Connect>
</Response>
"#,
            escape_attr(&self.action_url),
            escape_attr(&self.stream_url),
            escape_attr(&self.welcome_greeting),
        )
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> CallControlDocument {
        CallControlDocument {
            action_url: "https://example.com/action".to_string(),
            stream_url: "wss://relay.example.com/websocket".to_string(),
            welcome_greeting: "Hi! Ask me anything!".to_string(),
        }
    }

    #[test]
    fn renders_connect_wrapping_voxray() {
        let xml = document().render();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<Connect action="https://example.com/action">"#));
        assert!(xml.contains(
            r#"<Voxray url="wss://relay.example.com/websocket" welcomeGreeting="Hi! Ask me anything!" />"#
        ));
        let connect = xml.find("<Connect").unwrap();
        let voxray = xml.find("<Voxray").unwrap();
        let close = xml.find("</Connect>").unwrap();
        assert!(connect < voxray && voxray < close);
    }

    #[test]
    fn escapes_attribute_values() {
        let doc = CallControlDocument {
            action_url: "https://example.com/action?a=1&b=2".to_string(),
            welcome_greeting: r#"Say "hi" <now> & it's fine"#.to_string(),
            ..document()
        };
        let xml = doc.render();

        assert!(xml.contains(r#"action="https://example.com/action?a=1&amp;b=2""#));
        assert!(xml.contains(
            r#"welcomeGreeting="Say &quot;hi&quot; &lt;now&gt; &amp; it&apos;s fine""#
        ));
    }
}
