use std::sync::Arc;

use shuttle_core::app::{Client, ClientBuilder};
use shuttle_core::config::ClientConfig;
use shuttle_core::domain::{ColumnType, Timespec, TsRange, Value};
use shuttle_core::impls::InMemoryCluster;
use shuttle_core::typed::{Entry, TimeSeries};
use tracing_subscriber::EnvFilter;

/// 結果を表示するだけの callback
fn report(label: &'static str) -> Value {
    Value::function(move |argv| match argv.first() {
        Some(Value::Error(error)) => println!("{label}: error {error}"),
        _ => println!("{label}: {:?}", &argv[1..]),
    })
}

fn column(name: &str, column_type: ColumnType) -> Value {
    Value::object([("name", Value::from(name)), ("type", Value::from(column_type.as_number()))])
}

fn point(ms: i64, value: f64) -> Value {
    Value::object([
        ("timestamp", Value::Timestamp(Timespec::from_millis(ms))),
        ("value", Value::from(value)),
    ])
}

async fn scenario(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let d = &client.dispatcher;
    let cluster = &client.cluster;

    // (A) blob の往復とタグ
    let blob = cluster.blob("greeting");
    blob.put(d, vec![Value::buffer(b"hello shuttle".to_vec()), report("blob.put")])?;
    d.run_until_idle().await;
    blob.attach_tag(d, vec![Value::from("demo"), report("blob.attachTag")])?;
    blob.get(d, vec![report("blob.get")])?;
    d.run_until_idle().await;
    cluster.tag("demo").get_entries(d, vec![report("tag.getEntries")])?;
    cluster
        .range()
        .blob_scan(d, vec![Value::from("shuttle"), Value::from(10i64), report("range.blobScan")])?;
    d.run_until_idle().await;

    // (B) 名前で呼ぶ integer
    let counter = cluster.entity(&client.registry, "integer", "counter")?;
    counter.invoke(d, "put", vec![Value::from(40i64), report("integer.put")])?;
    d.run_until_idle().await;
    counter.invoke(d, "add", vec![Value::from(2i64), report("integer.add")])?;
    d.run_until_idle().await;

    // (C) time series
    let ts: TimeSeries = cluster.ts("metrics");
    ts.create(d, vec![Value::Array(vec![column("cpu", ColumnType::Double)]), report("ts.create")])?;
    d.run_until_idle().await;
    let cpu = ts.double_column("cpu");
    cpu.insert(d, vec![Value::Array(vec![point(1_000, 0.25), point(2_000, 0.75)]), report("cpu.insert")])?;
    d.run_until_idle().await;
    let range = TsRange::new(Timespec::from_millis(0), Timespec::from_millis(10_000));
    cpu.ranges(d, vec![Value::Array(vec![Value::Range(range)]), report("cpu.ranges")])?;
    cluster.query("select * from metrics").run(d, vec![report("query.run")])?;
    d.run_until_idle().await;

    // (D) 束縛エラーは同期的に返る
    if let Err(e) = blob.put(d, vec![Value::from(1i64), report("never called")]) {
        println!("blob.put rejected: {e}");
    }

    println!("counts: {}", serde_json::to_string(&d.counts().snapshot())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env();
    let backend = InMemoryCluster::new(config.uri.clone());
    let client = ClientBuilder::new(Arc::new(backend))
        .config(config)
        .with_standard_kinds()?
        .expect_kinds(&["blob", "integer", "range", "ts", "column_double"])
        .build()?;
    tracing::info!(uri = %client.cluster.connection().uri(), "client ready");

    client.cluster.connect(
        &client.dispatcher,
        vec![
            Value::function(|_| println!("connected")),
            Value::function(|argv| println!("connect failed: {:?}", argv.first())),
        ],
    )?;
    client.dispatcher.run_until_idle().await;
    if !client.cluster.connection().is_connected() {
        return Ok(());
    }

    scenario(&client).await
}
