use std::{fs, path::Path};

use carefree::{Carefree, MemoryValues, Value};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// In-memory stand-ins for the site's data sources.
#[derive(Deserialize)]
struct Fixtures {
    records: indexmap::IndexMap<String, Vec<serde_json::Value>>,
    values: indexmap::IndexMap<String, serde_json::Value>,
}

fn main() -> carefree::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/site");
    let mut engine = Carefree::from_config_file(root.join("carefree.toml"))?;

    let fixtures: Fixtures = load_json(&root.join("providers.json"))?;
    for (name, records) in fixtures.records {
        let records = records.into_iter().map(Value::from).collect();
        engine.providers_mut().register_records(name, records);
    }
    for (name, values) in fixtures.values {
        engine
            .providers_mut()
            .register_value(name, MemoryValues::from_json(values));
    }

    let data: serde_json::Value = load_json(&root.join("data.json"))?;

    // 1. Home page
    render_page(
        &engine,
        root.join("templates/index.html"),
        data.clone(),
        root.join("dist/index.html"),
    )?;

    // 2. Paged post list
    let list = fs::read_to_string(root.join("templates/list.html"))?;
    let list = engine.compile(&list)?;
    for page in 1..=3 {
        let mut page_data = data.clone();
        page_data["page"] = serde_json::json!(page);
        let html = engine.render(&list, page_data)?;
        write_output(root.join(format!("dist/posts/page/{page}/index.html")), html)?;
    }

    println!("Site written to {}/dist", root.display());
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> carefree::Result<T> {
    let source = fs::read_to_string(path)?;
    serde_json::from_str(&source)
        .map_err(|e| carefree::CarefreeError::Config(format!("{}: {e}", path.display())))
}

fn render_page(
    engine: &Carefree,
    template_path: impl AsRef<Path>,
    data: serde_json::Value,
    output_path: impl AsRef<Path>,
) -> carefree::Result<()> {
    let template = fs::read_to_string(template_path.as_ref())?;
    let template = engine.compile(&template)?;
    let html = engine.render(&template, data)?;
    write_output(output_path, html)
}

fn write_output(output_path: impl AsRef<Path>, html: String) -> carefree::Result<()> {
    if let Some(parent) = output_path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, html)?;
    Ok(())
}
