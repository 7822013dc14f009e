//! Export a [`Network`] in UPPAAL's flat XML format.
//!
//! The output follows the `flat-1_2` DTD without layout coordinates: UPPAAL
//! places locations itself when the file is opened.

use soarta_codegen::network::{LocationKind, Network, Template, Transition};

use crate::queries::Query;

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<!DOCTYPE nta PUBLIC '-//Uppaal Team//DTD Flat System 1.1//EN' \
'http://www.it.uu.se/research/group/darts/uppaal/flat-1_2.dtd'>\n";

/// Render `network` and `queries` as a complete UPPAAL document.
pub fn export_xml(network: &Network, queries: &[Query]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("<nta>\n");
    out.push_str(&format!(
        "<declaration>{}</declaration>\n",
        escape(&network.global_declaration)
    ));

    // Location ids are unique across the document.
    let mut next_id = 0;
    for template in &network.templates {
        emit_template(&mut out, template, next_id);
        next_id += template.locations.len();
    }

    out.push_str(&format!("<system>{}</system>\n", escape(&network.system_block)));

    out.push_str("<queries>\n");
    for query in queries {
        out.push_str("<query>\n");
        out.push_str(&format!("<formula>{}</formula>\n", escape(&query.formula)));
        out.push_str(&format!("<comment>{}</comment>\n", escape(&query.comment)));
        out.push_str("</query>\n");
    }
    out.push_str("</queries>\n");
    out.push_str("</nta>\n");
    out
}

fn emit_template(out: &mut String, template: &Template, offset: usize) {
    let id = |local: usize| format!("id{}", offset + local);

    out.push_str("<template>\n");
    out.push_str(&format!("<name>{}</name>\n", escape(&template.name)));
    if !template.declaration.is_empty() {
        out.push_str(&format!(
            "<declaration>{}</declaration>\n",
            escape(&template.declaration)
        ));
    }
    for location in &template.locations {
        out.push_str(&format!("<location id=\"{}\">\n", id(location.id.0)));
        out.push_str(&format!("<name>{}</name>\n", escape(&location.name)));
        match location.kind {
            LocationKind::Normal => {}
            LocationKind::Urgent => out.push_str("<urgent/>\n"),
            LocationKind::Committed => out.push_str("<committed/>\n"),
        }
        out.push_str("</location>\n");
    }
    out.push_str(&format!("<init ref=\"{}\"/>\n", id(template.initial.0)));
    for transition in &template.transitions {
        emit_transition(out, transition, &id);
    }
    out.push_str("</template>\n");
}

fn emit_transition(out: &mut String, transition: &Transition, id: &dyn Fn(usize) -> String) {
    out.push_str("<transition>\n");
    out.push_str(&format!("<source ref=\"{}\"/>\n", id(transition.source.0)));
    out.push_str(&format!("<target ref=\"{}\"/>\n", id(transition.target.0)));
    let labels = [
        ("select", &transition.select),
        ("guard", &transition.guard),
        ("synchronisation", &transition.sync),
        ("assignment", &transition.update),
    ];
    for (kind, text) in labels {
        if let Some(text) = text {
            out.push_str(&format!(
                "<label kind=\"{kind}\">{}</label>\n",
                escape(text)
            ));
        }
    }
    out.push_str("</transition>\n");
}

/// Escape XML special characters in text and attribute content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
