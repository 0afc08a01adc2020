use std::fs;
use std::io;

use anyhow::{Context, bail};
use log::info;
use record_tree::encode::{records_from_json, to_json_writer};
use record_tree::fields::{count, group_by_fields, sum};
use record_tree::{Node, StructSpec, Tree, Value};

const USAGE: &str = "usage: tree-report <records.json> <group-field>[,<group-field>...] <sum-field>...";

/// Report over `records`: overall totals plus one row per distinct
/// combination of `group_fields`, ordered by key.
fn report_spec(group_fields: &[&str], sum_fields: &[String]) -> StructSpec<Value> {
    let mut totals = StructSpec::new();
    let mut per_group = StructSpec::new();
    for name in group_fields {
        per_group = per_group.grouping_field(*name);
    }
    per_group = per_group.field("records", count());
    for name in sum_fields {
        totals = totals.field(name.as_str(), sum(name));
        per_group = per_group.field(name.as_str(), sum(name));
    }

    let keys: Vec<String> = group_fields.iter().map(|s| s.to_string()).collect();
    let groups = group_by_fields(per_group).post_sort_key(move |row| {
        Ok(Value::List(
            keys.iter()
                .map(|k| row.get(k).cloned().unwrap_or_default())
                .collect(),
        ))
    });

    StructSpec::new()
        .field("records", count())
        .field("totals", totals)
        .field("groups", groups)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!(USAGE);
    }
    let group_fields: Vec<&str> = args[1].split(',').filter(|s| !s.is_empty()).collect();
    if group_fields.is_empty() {
        bail!("no group fields given\n{}", USAGE);
    }
    let sum_fields = &args[2..];

    let text = fs::read_to_string(&args[0]).with_context(|| format!("reading {}", args[0]))?;
    let records = records_from_json(&text)?;
    info!("loaded {} records from {}", records.len(), args[0]);

    let mut tree = Tree::new(report_spec(&group_fields, sum_fields))?;
    for (i, record) in records.iter().enumerate() {
        tree.feed(record).with_context(|| format!("record {}", i))?;
    }

    to_json_writer(io::stdout().lock(), &tree.value()?)?;
    Ok(())
}
