/*============================================================
  Synavera Project: KM-Confluence
  Module: km_confluence::markup
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    HTML escaping for every remote-supplied value written into
    panel markup.

  Security / Safety Notes:
    Space names, page titles and hrefs come from the remote
    wiki and are escaped before insertion.

  Dependencies:
    None beyond std.

  Revision History:
    2025-02-11 COD  Added escaping helper.
============================================================*/

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
