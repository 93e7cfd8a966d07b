use std::sync::Arc;

use rs_presage_core::config::PresageConfig;
use rs_presage_core::io::{get_filename, list_files};
use rs_presage_core::store::ingest::{ingest_corpus, IngestOptions};
use rs_presage_core::store::{open_store, NgramReader, WriteMode};
use rs_presage_core::Presage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Read "./presage.toml" if present, defaults otherwise
    let mut config = PresageConfig::load_or_default("./presage.toml");

    // Keep the n-grams on disk so the server can serve them afterward
    config.store.backend = "file".to_owned();

    // Open (or create) the store with the configured normalization.
    // Reopening a store built with another normalization fails.
    let mut store = open_store(&config.store)?;

    // Every ".txt" file in "./data" is a corpus, one sentence per line.
    // The first corpus replaces what the store held, the next ones are appended.
    let corpora = list_files("./data", "txt")?;
    log::info!("found {} corpora in ./data", corpora.len());
    for (i, corpus) in corpora.iter().enumerate() {
        let options = IngestOptions {
            mode: if i == 0 { WriteMode::Replace } else { WriteMode::Append },
            build_index: true,
            lowercase: config.store.lowercase,
            cutoff: 0,
            classes: config.tokenizer.clone(),
        };
        for order in 1..=config.max_order() {
            let report = ingest_corpus(&mut store, corpus, order, &options)?;
            println!("{}: {} {}-grams", get_filename(corpus)?, report.rows, order);
        }
    }
    println!("Store orders: {:?}", store.orders());

    // Serve predictions from the freshly built store
    let mut presage = Presage::new(&config, Arc::new(store))?;
    for text in ["Der ", "Der Links", "und dann schreibt er ", "Am nächsten Mor"] {
        println!("{text:?} -> {:?}", presage.predict(text));
    }

    // A new session shares the store but not the typed text
    let mut session = presage.new_session();
    session.update("Es regnet seit dem ");
    println!("context changed: {}", session.context_change());
    println!("{:?}", session.predict_current(2).into_words());

    Ok(())
}
