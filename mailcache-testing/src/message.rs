/// Builds a raw message with the given `Message-ID`, `References`
/// and body.
pub fn raw_message(id: &str, references: &[&str], body: &str) -> String {
    let mut raw = format!("Message-ID: <{id}>\r\n");

    if !references.is_empty() {
        let references: Vec<String> = references.iter().map(|id| format!("<{id}>")).collect();
        raw.push_str(&format!("References: {}\r\n", references.join(" ")));
    }

    raw.push_str(&format!("Subject: {id}\r\n\r\n{body}\r\n"));
    raw
}
