//! Raw HTML fragments embedded in generated markdown.

use crate::model::{Condition, Step};

/// Styles for the jump bar, example cards and the subtest table. Emitted
/// once per page ahead of the jump bar.
pub const PAGE_STYLE: &str = r#"<style>
.hm-idx{position:sticky;top:var(--md-header-height,0);z-index:2;
background:var(--md-default-bg-color,#fff);border-bottom:1px solid rgba(128,128,128,.2);
padding:8px .8rem;margin:0 -.8rem 16px;text-align:center;
font-family:ui-monospace,SFMono-Regular,monospace;font-size:13px;letter-spacing:1px}
.hm-idx a{display:inline-block;min-width:28px;height:28px;line-height:28px;
text-align:center;text-decoration:none;border-radius:4px;
color:var(--md-typeset-a-color,#1a73e8);transition:background .15s}
.hm-idx a:hover{background:rgba(128,128,128,.12)}
.hm-idx .x{display:inline-block;min-width:28px;height:28px;line-height:28px;
text-align:center;opacity:.2}
.hm-example{position:relative;
background:var(--md-code-bg-color,#f5f5f5);
border:1px solid rgba(128,128,128,.2);border-radius:6px;
margin:0 0 16px;overflow:hidden}
.hm-example-label{display:block;padding:6px 12px;
font-size:11px;font-weight:600;text-transform:uppercase;letter-spacing:.5px;
color:var(--md-default-fg-color--light,#666);
border-bottom:1px solid rgba(128,128,128,.15);
background:rgba(128,128,128,.06)}
.hm-example pre{margin:0!important;border:0!important;border-radius:0!important;
background:transparent!important}
.hm-example code{font-size:12.5px!important;line-height:1.5!important}
.hm-appendix .hm-example{float:none;width:100%;margin:0 0 12px}
@media(min-width:960px){
.hm-example{float:right;clear:right;width:45%;margin:0 0 16px 24px}
}
@media(max-width:959px){
.hm-example{width:100%}
}
.hm-tc-table{width:100%;border-collapse:collapse;margin:16px 0}
.hm-tc-table th{background:var(--md-default-fg-color--lightest,#f0f0f0);
padding:10px 14px;text-align:left;font-size:13px;font-weight:600;
text-transform:uppercase;letter-spacing:.5px;
border-bottom:2px solid var(--md-typeset-a-color,#1a73e8)}
.hm-tc-table td{padding:10px 14px;border-bottom:1px solid rgba(128,128,128,.15);
vertical-align:top;font-size:13.5px;line-height:1.6}
.hm-tc-table tr:hover td{background:rgba(128,128,128,.04)}
.hm-tc-table td:first-child{width:30%;white-space:nowrap}
.hm-tc-table ol{margin:0;padding-left:1.4em}
.hm-tc-table ol li{margin:2px 0}
.hm-tc-table code{font-size:12px;padding:1px 4px;
background:var(--md-code-bg-color,#f5f5f5);border-radius:3px}
.hm-tc-table strong{color:var(--md-typeset-a-color,#1a73e8)}
</style>"#;

/// Escape text placed inside an element.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape text placed inside an attribute value.
pub fn html_escape(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// A labelled code card. `code` is escaped here.
pub fn example_card(label: &str, lang: &str, code: &str) -> String {
    format!(
        "<div class=\"hm-example\"><span class=\"hm-example-label\">{}</span>\
         <pre><code class=\"language-{}\">{}</code></pre></div>",
        label,
        html_escape(lang),
        escape_text(code)
    )
}

/// Ordered list of steps. Branches close the current list, print their
/// condition and continue in a fresh one.
pub fn steps_html(steps: &[Step]) -> String {
    let mut out = String::from("<ol>");
    for step in steps {
        match step {
            Step::Text(text) => push_item(&mut out, text),
            Step::Branch { condition, steps } => {
                out.push_str(&branch_header(condition));
                for child in steps {
                    match child {
                        Step::Text(text) => push_item(&mut out, text),
                        Step::Branch { .. } => {
                            out.push_str(&steps_html(std::slice::from_ref(child)))
                        }
                    }
                }
            }
        }
    }
    out.push_str("</ol>");
    out
}

fn push_item(out: &mut String, text: &str) {
    out.push_str("<li>");
    out.push_str(&escape_text(text));
    out.push_str("</li>");
}

fn branch_header(condition: &Condition) -> String {
    match condition {
        Condition::Otherwise => "</ol><p><em>Otherwise, do following steps:</em></p><ol>".into(),
        Condition::Expr(expr) => format!(
            "</ol><p><em>If condition (<code>{}</code>) is met, do following steps:</em></p><ol>",
            escape_text(expr)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_escapes_code() {
        let card = example_card("Example", "c", "if (a < b && c)\n\treturn;");
        assert_eq!(
            card,
            "<div class=\"hm-example\"><span class=\"hm-example-label\">Example</span>\
             <pre><code class=\"language-c\">if (a &lt; b &amp;&amp; c)\n\treturn;</code></pre></div>"
        );
    }

    #[test]
    fn flat_steps() {
        let steps = vec![Step::Text("Open device.".into()), Step::Text("Close it.".into())];
        assert_eq!(
            steps_html(&steps),
            "<ol><li>Open device.</li><li>Close it.</li></ol>"
        );
    }

    #[test]
    fn branch_steps() {
        let steps = vec![
            Step::Text("Open.".into()),
            Step::Branch {
                condition: Condition::Expr("n > 0".into()),
                steps: vec![Step::Text("Assert `x`.".into())],
            },
            Step::Branch {
                condition: Condition::Otherwise,
                steps: vec![Step::Text("Skip.".into())],
            },
        ];
        let html = steps_html(&steps);
        assert_eq!(
            html,
            "<ol><li>Open.</li>\
             </ol><p><em>If condition (<code>n &gt; 0</code>) is met, do following steps:</em></p><ol>\
             <li>Assert `x`.</li>\
             </ol><p><em>Otherwise, do following steps:</em></p><ol><li>Skip.</li></ol>"
        );
    }

    #[test]
    fn nested_branch_gets_own_list() {
        let inner = Step::Branch {
            condition: Condition::Expr("b".into()),
            steps: vec![Step::Text("Inner.".into())],
        };
        let steps = vec![Step::Branch {
            condition: Condition::Expr("a".into()),
            steps: vec![inner],
        }];
        let html = steps_html(&steps);
        assert_eq!(html.matches("<ol>").count(), 4);
        assert!(html.contains("<code>b</code>"));
    }
}
