use super::{FewShotExample, KnowledgeBase, MarginTerm};
use std::collections::BTreeMap;

const NICKNAMES: &[(&str, &str)] = &[
    ("johnny", "john"),
    ("jack", "john"),
    ("jon", "john"),
    ("mike", "michael"),
    ("mikey", "michael"),
    ("bob", "robert"),
    ("bobby", "robert"),
    ("rob", "robert"),
    ("billy", "william"),
    ("jim", "james"),
    ("jimmy", "james"),
    ("tom", "thomas"),
    ("tommy", "thomas"),
    ("dave", "david"),
    ("dan", "daniel"),
    ("danny", "daniel"),
    ("chris", "christopher"),
    ("matt", "matthew"),
    ("nick", "nicholas"),
    ("tony", "anthony"),
    ("joe", "joseph"),
    ("joey", "joseph"),
    ("steve", "steven"),
    ("rick", "richard"),
    ("dick", "richard"),
    ("ed", "edward"),
    ("eddie", "edward"),
    ("alex", "alexander"),
    ("ben", "benjamin"),
    ("sam", "samuel"),
    ("liz", "elizabeth"),
    ("beth", "elizabeth"),
    ("kate", "katherine"),
    ("katie", "katherine"),
    ("jen", "jennifer"),
    ("jenny", "jennifer"),
    ("manny", "manuel"),
    ("chuy", "jesus"),
    ("pepe", "jose"),
];

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(super) fn construction() -> KnowledgeBase {
    KnowledgeBase {
        version: "2024.3".to_string(),
        business_rules: lines(&[
            "Generate exactly one read-only SELECT (or WITH ... SELECT) statement. Never INSERT, UPDATE, DELETE, or DDL.",
            "Never treat documentation-only tables (project_documents, estimate_line_item_notes) as financial sources; amounts live in expenses, estimates, change_orders and the project financial views.",
            "Always use fuzzy substring matching for person names: lower-case both sides and use ILIKE '%name%'. Convert common nicknames to their base name first (Johnny -> john, Bob -> robert).",
            "Project names are matched the same way: ILIKE '%fragment%' on project_name, never exact equality on user wording.",
            "Only approved change orders (status = 'approved') affect contract value.",
            "Time entries record hours in the hours column; labor cost is hours * hourly_rate.",
            "Relative dates are resolved against CURRENT_DATE. 'Last week' is the previous Monday-to-Sunday week.",
            "Prefer the pre-aggregated view project_financial_summary for any per-project financial question.",
            "Always alias computed columns with snake_case names that describe the metric (total_hours, total_expenses, margin_percentage).",
        ]),
        field_conventions: lines(&[
            "Monetary columns end in _amount, _cost or start with total_ and are stored in dollars.",
            "Percentages are stored as 0-100 numbers in columns ending in _percentage.",
            "Dates end in _date and are DATE typed; timestamps end in _at.",
            "Foreign keys are <entity>_id (project_id, payee_id).",
        ]),
        entity_rules: lines(&[
            "People who log time are payees with payee_type = 'employee'; join time_entries.payee_id = payees.id and match payees.payee_name.",
            "Vendors and subcontractors are payees with payee_type in ('vendor', 'subcontractor').",
            "A project is identified by project_number (e.g. '24-105') or by a fragment of project_name.",
            "Customers are stored on projects.client_name; there is no separate customer table.",
        ]),
        margin_terms: vec![
            MarginTerm {
                term: "Contract Value".to_string(),
                formula: "contract_amount + SUM(approved change_orders.amount)".to_string(),
                use_when: "'contract', 'revenue', 'what we are billing'".to_string(),
            },
            MarginTerm {
                term: "Actual Margin".to_string(),
                formula: "contract_value - total_expenses".to_string(),
                use_when: "'profit', 'margin' without qualifier, 'how much did we make'".to_string(),
            },
            MarginTerm {
                term: "Margin Percentage".to_string(),
                formula: "(contract_value - total_expenses) / NULLIF(contract_value, 0) * 100".to_string(),
                use_when: "'margin %', 'margin percent', 'profitability'".to_string(),
            },
            MarginTerm {
                term: "Estimated Margin".to_string(),
                formula: "estimates.total_amount - estimates.total_cost".to_string(),
                use_when: "'estimated', 'planned', 'bid' margin".to_string(),
            },
            MarginTerm {
                term: "Projected Margin".to_string(),
                formula: "contract_value - (total_expenses + remaining_budgeted_cost)".to_string(),
                use_when: "'projected', 'expected at completion', 'forecast'".to_string(),
            },
            MarginTerm {
                term: "Budget Variance".to_string(),
                formula: "total_expenses - budget_amount (positive means over budget)".to_string(),
                use_when: "'over budget', 'under budget', 'variance'".to_string(),
            },
        ],
        nicknames: NICKNAMES
            .iter()
            .map(|(nick, base)| (nick.to_string(), base.to_string()))
            .collect::<BTreeMap<_, _>>(),
        examples: vec![
            FewShotExample {
                question: "How many hours did Johnny work last week?".to_string(),
                reasoning: "Johnny is a nickname for John, so match the base name with a case-insensitive substring. Last week is the previous Monday-Sunday range.".to_string(),
                sql: "SELECT p.payee_name, SUM(t.hours) AS total_hours\nFROM time_entries t\nJOIN payees p ON p.id = t.payee_id\nWHERE p.payee_name ILIKE '%john%'\n  AND t.entry_date >= date_trunc('week', CURRENT_DATE) - INTERVAL '7 days'\n  AND t.entry_date < date_trunc('week', CURRENT_DATE)\nGROUP BY p.payee_name".to_string(),
            },
            FewShotExample {
                question: "Show me projects over budget".to_string(),
                reasoning: "Over budget is Budget Variance > 0. The financial summary view already carries totals per project.".to_string(),
                sql: "SELECT project_number, project_name, budget_amount, total_expenses,\n       total_expenses - budget_amount AS budget_variance\nFROM project_financial_summary\nWHERE total_expenses > budget_amount\nORDER BY budget_variance DESC".to_string(),
            },
            FewShotExample {
                question: "What is the margin on the Miller kitchen remodel?".to_string(),
                reasoning: "Unqualified 'margin' means Actual Margin; also return Margin Percentage. Match the project by name fragment.".to_string(),
                sql: "SELECT project_name, contract_value, total_expenses, actual_margin, margin_percentage\nFROM project_financial_summary\nWHERE project_name ILIKE '%miller%' AND project_name ILIKE '%kitchen%'".to_string(),
            },
            FewShotExample {
                question: "Total expenses by category for project 24-105".to_string(),
                reasoning: "Expenses carry a category; group and sum for the one project identified by number.".to_string(),
                sql: "SELECT e.category, SUM(e.amount) AS total_amount\nFROM expenses e\nJOIN projects p ON p.id = e.project_id\nWHERE p.project_number = '24-105'\nGROUP BY e.category\nORDER BY total_amount DESC".to_string(),
            },
        ],
        kpi_fields: lines(&[
            "contract_amount",
            "contract_value",
            "total_expenses",
            "actual_margin",
            "margin_percentage",
            "estimated_margin",
            "projected_margin",
            "budget_amount",
            "budget_variance",
            "labor_cost",
            "change_order_amount",
        ]),
    }
}
