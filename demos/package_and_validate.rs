//! Run this example with the following command in a terminal:
//!
//! ```console
//! $ RUST_LOG=async_bagger=debug cargo run --example package_and_validate -- ~/photos /tmp/photos.tar
//! ```
//!
//! An optional third argument is a BagIt profile in JSON, otherwise a profile requiring sha256
//! manifests is used.

use async_bagger::{BagItProfile, Bagger, EventMessage, SourceFile, Validator};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let source = args
        .get(1)
        .expect("CLI argument representing the file or directory to bag");
    let output = args
        .get(2)
        .expect("CLI argument representing where the bag will be written");

    let profile = match args.get(3) {
        Some(path) => BagItProfile::load(path).await?,
        None => {
            let mut profile = BagItProfile::new();
            profile.name = "Demo profile".into();
            profile.manifests_required = vec!["sha256".into()];
            profile.tag_manifests_required = vec!["sha256".into()];
            profile
        }
    };

    // Print progress from another task while the bag is written
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<EventMessage>();
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            println!("[{:>3}%] {}", event.percent, event.message);
        }
    });

    let files = SourceFile::list_recursive(source).await?;
    println!("Bagging {} files from `{source}` into `{output}`", files.len());

    let mut bagger = Bagger::new(output, profile.clone(), files).with_progress(sender.clone());
    if !bagger.run().await {
        for (key, message) in &bagger.errors {
            eprintln!("{key}: {message}");
        }
        return Err("bagging failed".into());
    }
    println!("Bag written, Payload-Oxum is {}", bagger.payload_oxum());
    drop(bagger);

    let mut validator = Validator::new(output, profile).with_progress(sender);
    let scanned = validator.scan_bag().await;
    let valid = validator.validate();
    let report = validator.error_string();
    // Last sender gone, the printer task can end
    drop(validator);
    printer.await?;

    if let Err(e) = scanned {
        eprintln!("Could not read the bag: {e}");
    }
    if !valid {
        eprintln!("{report}");
        return Err("the bag is not valid".into());
    }

    println!("The bag at `{output}` is valid");
    Ok(())
}
