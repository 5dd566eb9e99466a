use burn::backend::Autodiff;
use clap::Parser;
use mnist_mlp::{
    backend::{self, Backend},
    cli::{Cli, Procedure},
    inference, logger, training, Result,
};

fn run(cli: &Cli) -> Result<()> {
    let device = backend::device(&cli.gpu)?;

    match &cli.procedure {
        Procedure::Train(args) => {
            training::train::<Autodiff<Backend>>(
                &cli.artifact_dir,
                &args.training_config(),
                device,
                cli.verbose(),
            )?;
        }
        Procedure::Inference { image_path } => {
            if cli.artifact_dir.is_dir() {
                logger::install_file_logger(&training::log_path(&cli.artifact_dir));
            }

            let prediction = inference::infer::<Backend>(&cli.artifact_dir, image_path, device)?;
            println!("{prediction}");
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Exposed before any backend gets initialized.
    std::env::set_var("CUDA_VISIBLE_DEVICES", &cli.gpu);

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
