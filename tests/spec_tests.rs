use markstone::{markdown_to_html, render_inline};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
struct Case {
    markdown: String,
    html: String,
    example: u32,
    section: String,
}

fn load_cases() -> Vec<Case> {
    let data = fs::read_to_string("tests/data/cases.json").expect("Failed to read cases.json");
    serde_json::from_str(&data).expect("Failed to parse cases.json")
}

#[test]
fn rendering_cases() {
    let cases = load_cases();
    let mut failures = Vec::new();

    for case in cases.iter() {
        let result = markdown_to_html(&case.markdown).expect("parse failed");
        if result != case.html {
            eprintln!("\nExample {} failed ({})", case.example, case.section);
            eprintln!("  Input: {:?}", case.markdown);
            eprintln!("  Expected: {:?}", case.html);
            eprintln!("  Got: {:?}", result);
            failures.push(case.example);
        }
    }

    eprintln!(
        "\n{} of {} examples passed",
        cases.len() - failures.len(),
        cases.len()
    );
    assert!(failures.is_empty(), "failed examples: {:?}", failures);
}

#[test]
fn inline_rendering_is_stable() {
    // Rendering the inline HTML of every paragraph a second time must not change it
    for case in load_cases() {
        for line in case.html.lines() {
            let Some(inner) = line
                .trim_start()
                .strip_prefix("<p>")
                .and_then(|rest| rest.strip_suffix("</p>"))
            else {
                continue;
            };
            assert_eq!(
                render_inline(inner),
                inner,
                "example {} is not a fixed point",
                case.example
            );
        }
    }
}

#[test]
fn blank_documents_render_nothing() {
    for input in ["", "\n", "   \n\n\t\n"] {
        assert_eq!(markdown_to_html(input).unwrap(), "");
    }
}
