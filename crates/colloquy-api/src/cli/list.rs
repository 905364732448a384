//! `colloquy list scenarios|presets`

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use colloquy_core::presets as builtin;

use super::ListResource;

pub fn list(resource: &ListResource, json: bool) -> anyhow::Result<()> {
    match resource {
        ListResource::Scenarios => list_scenarios(json),
        ListResource::Presets => list_presets(json),
    }
}

fn list_scenarios(json: bool) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for (key, _) in builtin::scenario_keys() {
        rows.push(builtin::scenario(key)?);
    }

    if json {
        let out: Vec<serde_json::Value> = rows
            .iter()
            .map(|s| {
                serde_json::json!({
                    "key": s.key,
                    "name": s.name,
                    "description": s.description,
                    "events": s.events.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = table(&["Key", "Name", "Description", "Events"]);
    for s in &rows {
        table.add_row(vec![
            Cell::new(&s.key).fg(Color::Cyan),
            Cell::new(&s.name),
            Cell::new(&s.description),
            Cell::new(s.events.len()),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn list_presets(json: bool) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for (key, name) in builtin::preset_keys() {
        rows.push((key, name, builtin::preset(key)?));
    }

    if json {
        let out: Vec<serde_json::Value> = rows
            .iter()
            .map(|(key, name, personas)| {
                serde_json::json!({ "key": key, "name": name, "personas": personas })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = table(&["Key", "Name", "Personas"]);
    for (key, name, personas) in &rows {
        let cast = personas
            .iter()
            .map(|p| format!("{} ({}, {})", p.name, p.species, p.archetype))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(name),
            Cell::new(cast),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub(crate) fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.iter().map(|h| Cell::new(h).fg(Color::White)));
    table
}
