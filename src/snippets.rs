//! Static completion lists for the template trigger characters.
//!
//! These are product data, fixed at build time, and answered without ever
//! contacting the upstream.

use crate::protocol::{CompletionItem, CompletionList};

/// CompletionItemKind.Snippet.
const KIND_SNIPPET: u32 = 15;
/// InsertTextFormat.Snippet.
const FORMAT_SNIPPET: u32 = 2;

fn snippet(label: &str, insert_text: &str) -> CompletionItem {
    let mut item = CompletionItem::new(label);
    item.kind = Some(KIND_SNIPPET);
    item.insert_text = Some(insert_text.to_string());
    item.insert_text_format = Some(FORMAT_SNIPPET);
    item
}

fn list(items: Vec<CompletionItem>) -> CompletionList {
    CompletionList {
        is_incomplete: false,
        items,
    }
}

/// Completions offered after `<`.
#[must_use]
pub fn html() -> CompletionList {
    list(vec![
        snippet("a", "a href=\"${1}\">${2}</a>"),
        snippet("div", "div>\n\t${1}\n</div>"),
        snippet("form", "form action=\"${1}\" method=\"${2:post}\">\n\t${3}\n</form>"),
        snippet("input", "input type=\"${1:text}\" name=\"${2}\"/>"),
        snippet("p", "p>${1}</p>"),
        snippet("span", "span>${1}</span>"),
        snippet("table", "table>\n\t<tr>\n\t\t<td>${1}</td>\n\t</tr>\n</table>"),
        snippet("ul", "ul>\n\t<li>${1}</li>\n</ul>"),
    ])
}

/// Completions offered after `{`.
#[must_use]
pub fn template() -> CompletionList {
    list(vec![
        snippet("if", "%! if ${1} %}\n\t${2}\n{%! endif %}"),
        snippet("for", "%! for ${1} %}\n\t${2}\n{%! endfor %}"),
        snippet("switch", "%! switch ${1} %}\n\t{%! case ${2} %}\n\t${3}\n{%! endswitch %}"),
        snippet("expression", "%= ${1} %}"),
        snippet("call", "%! call ${1}(${2}) %}"),
        snippet("children", "%! children %}"),
    ])
}
