use crate::gateway::{SchemaContext, TableInfo};
use crate::knowledge::KnowledgeBase;
use chrono::NaiveDate;
use std::fmt::Write;

/// Builds the grounding document sent as the system message to the generator.
pub fn compose(question: &str, schema: &SchemaContext, kb: &KnowledgeBase, today: NaiveDate) -> String {
    let mut doc = String::new();

    doc.push_str(
        "You are a SQL analyst for a construction project management company. \
         Translate the user's question into exactly one read-only SQL query over the schema below \
         and return it through the generate_sql_query function.\n",
    );
    let _ = writeln!(doc, "Today's date is {}.", today.format("%Y-%m-%d"));

    doc.push_str("\n## CRITICAL BUSINESS RULES\n");
    for rule in &kb.business_rules {
        let _ = writeln!(doc, "- {}", rule);
    }

    if !kb.field_conventions.is_empty() {
        doc.push_str("\n## FIELD CONVENTIONS\n");
        for convention in &kb.field_conventions {
            let _ = writeln!(doc, "- {}", convention);
        }
    }

    if !kb.margin_terms.is_empty() {
        doc.push_str("\n## MARGIN TERMINOLOGY\n");
        doc.push_str("| Metric | Formula | Use when the user says |\n|---|---|---|\n");
        for term in &kb.margin_terms {
            let _ = writeln!(doc, "| {} | {} | {} |", term.term, term.formula, term.use_when);
        }
    }

    if !kb.entity_rules.is_empty() {
        doc.push_str("\n## ENTITY LOOKUP RULES\n");
        for rule in &kb.entity_rules {
            let _ = writeln!(doc, "- {}", rule);
        }
    }

    let hints = kb.name_hints(question);
    if !hints.is_empty() {
        doc.push_str("\n## NAME RESOLUTION FOR THIS QUESTION\n");
        for hint in &hints {
            let _ = writeln!(
                doc,
                "- \"{}\" is a nickname for \"{}\": match names case-insensitively with {}",
                hint.spoken,
                hint.base,
                hint.pattern()
            );
        }
    }

    if !kb.examples.is_empty() {
        doc.push_str("\n## EXAMPLES\n");
        for example in &kb.examples {
            let _ = writeln!(
                doc,
                "Question: {}\nReasoning: {}\nSQL:\n{}\n",
                example.question, example.reasoning, example.sql
            );
        }
    }

    doc.push_str("\n## SCHEMA\n");
    write_relations(&mut doc, "Tables", &schema.tables);
    write_relations(&mut doc, "Views", &schema.views);
    if !schema.enums.is_empty() {
        doc.push_str("Enums:\n");
        for e in &schema.enums {
            let _ = writeln!(doc, "- {}: {}", e.name, e.values.join(", "));
        }
    }

    doc
}

fn write_relations(doc: &mut String, heading: &str, relations: &[TableInfo]) {
    if relations.is_empty() {
        return;
    }
    let _ = writeln!(doc, "{}:", heading);
    for relation in relations {
        let columns = relation
            .columns
            .iter()
            .map(|c| {
                if c.data_type.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} {}", c.name, c.data_type)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(doc, "- {}({})", relation.name, columns);
    }
}
