use serde_json::json;

use super::types::ToolDef;

pub fn available_tools(has_page: bool) -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "track_vendor",
            description: "Save the vendor's email address, then summarize the vendor's five most recent messages. Returns the summary text: client name, date, time, location, items with prices and special notes.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "email": {
                        "type": "string",
                        "description": "Vendor email address, e.g. orders@vendor.com"
                    },
                    "show_emails": show_emails_param()
                },
                "required": ["email"]
            }),
        },
        ToolDef {
            name: "summarize_thread",
            description: if has_page {
                "Summarize an email thread. Without 'subject', the thread shown on the open mail page is used."
            } else {
                "Summarize the email thread whose subject matches 'subject'."
            },
            input_schema: json!({
                "type": "object",
                "properties": {
                    "subject": {
                        "type": "string",
                        "description": "Exact subject of the thread to summarize"
                    },
                    "show_emails": show_emails_param()
                }
            }),
        },
        ToolDef {
            name: "get_state",
            description: "Show the saved vendor email and the last summary with its time.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "'compact' (default, readable text) or 'full' (JSON)",
                        "enum": ["compact", "full"]
                    }
                }
            }),
        },
    ]
}

fn show_emails_param() -> serde_json::Value {
    json!({
        "type": "boolean",
        "description": "Also list the subject and start of each email that was summarized"
    })
}
