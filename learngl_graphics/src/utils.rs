/// Turns the buffer filled by `glGet*InfoLog` into a `String`.
///
/// Drivers NUL-terminate the log and often end it with a newline, neither of which is wanted when
/// the log is embedded in a diagnostic.
pub fn info_log_to_string(mut buf: Vec<u8>) -> String {
    if let Some(nul) = buf.iter().position(|&b| b == 0) {
        buf.truncate(nul);
    }

    String::from_utf8_lossy(&buf) // Cow<str>
        .trim_end()
        .to_owned()
}

#[cfg(test)]
mod test {
    use super::info_log_to_string;

    #[test]
    fn stops_at_the_terminator() {
        let buf = b"0:3(1): error: syntax error\n\0garbage".to_vec();
        assert_eq!(info_log_to_string(buf), "0:3(1): error: syntax error");
    }

    #[test]
    fn empty_log_is_empty_string() {
        assert_eq!(info_log_to_string(vec![]), "");
        assert_eq!(info_log_to_string(vec![0]), "");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let buf = vec![b'o', b'k', 0xFF, 0];
        assert_eq!(info_log_to_string(buf), "ok\u{FFFD}");
    }
}
