use ammonia;

/// Clean post HTML produced by the rich-text editor.
///
/// Whitelist-based: formatting tags (<b>, <p>, <ul>, <a>) survive, while
/// <script>, <iframe> and event-handler attributes are stripped. Post bodies
/// are rendered as HTML by the client, so they are cleaned before storage.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
