use paradox_reader::{OpenOptions, ParadoxReader, Value};

fn main() {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| {
        eprintln!("usage: paradox-reader <table.db> [password]");
        std::process::exit(2);
    });
    let password = args.next();

    let doc = ParadoxReader::open(
        &path,
        OpenOptions {
            encoding: None,
            password,
        },
    )
    .expect("Failed to open table");

    let meta = doc.metadata().expect("Failed to read metadata");
    println!(
        "{}: {} records, {} fields, codepage {:?}",
        meta.table_name, meta.record_count, meta.field_count, meta.codepage
    );
    for field in &meta.fields {
        println!("  {} {} ({} bytes)", field.name, field.kind, field.size);
    }

    for result in doc.records().expect("Failed to start iteration") {
        let record = result.expect("Failed to read record");
        let cells: Vec<String> = record
            .values()
            .iter()
            .map(|v| match v {
                Value::Null => "NULL".to_string(),
                Value::Int(i) => i.to_string(),
                Value::Float(x) => x.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Date(days) => format!("date({})", days),
                Value::Timestamp(secs) => format!("ts({})", secs),
                Value::Time(secs) => format!("time({})", secs),
                Value::Text(s) => s.clone(),
                Value::Bytes(b) => format!("{} bytes", b.len()),
                Value::Blob(b) => format!("blob of {} bytes", b.len()),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }

    for warning in doc.warnings().expect("Failed to read warnings") {
        eprintln!("warning: {}", warning);
    }

    doc.close().expect("Failed to close table");
}
