use std::{fs, path::PathBuf};

use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use secrecy::ExposeSecret;
use xml_signer::{
    config::Config,
    pki::{CertificateBundle, cert_utils},
    telemetry,
    xmldsig::{SignatureRequest, XmlSignatureVerifier, XmlSigner},
};

/// Enveloped XML digital signatures with PKCS#12 certificates.
#[derive(Parser, Debug)]
#[command(name = "xml-signer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign one element of an XML document.
    Sign(SignArgs),
    /// Verify the signature embedded in an XML document.
    Verify(VerifyArgs),
    /// Print the metadata of an archive's certificate as JSON.
    Info(CertificateArgs),
    /// Write a self-signed development archive.
    GenerateArchive(GenerateArgs),
}

#[derive(Args, Debug)]
struct CertificateArgs {
    /// PKCS#12 archive, defaults to `certificate.path` from the configuration
    #[arg(long)]
    certificate: Option<PathBuf>,
    /// Archive passphrase, defaults to `certificate.passphrase` from the configuration
    #[arg(long)]
    passphrase: Option<String>,
}

#[derive(Args, Debug)]
struct SignArgs {
    /// XML document to sign
    #[arg(long)]
    input: PathBuf,
    /// Where to write the signed document, stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
    #[command(flatten)]
    certificate: CertificateArgs,
    /// Id of the element to sign, the first element with an Id when omitted
    #[arg(long)]
    element_id: Option<String>,
    /// Closing tag the signature is inserted before
    #[arg(long)]
    tag: Option<String>,
    /// Print the full signing result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Signed XML document
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    output: PathBuf,
    #[arg(long)]
    passphrase: String,
    #[arg(long, default_value = "XML Signer Development")]
    common_name: String,
    /// Validity period in days
    #[arg(long, default_value_t = 365)]
    days: i64,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = Config::load().wrap_err("Failed to load configuration")?;

    match cli.command {
        Commands::Sign(args) => sign(&config, args),
        Commands::Verify(args) => verify(args),
        Commands::Info(args) => info(&config, args),
        Commands::GenerateArchive(args) => generate_archive(args),
    }
}

fn sign(config: &Config, args: SignArgs) -> Result<()> {
    let xml = fs::read_to_string(&args.input)
        .wrap_err_with(|| format!("Failed to read {}", args.input.display()))?;
    let certificate = load_bundle(config, &args.certificate)?;

    let mut request = SignatureRequest::new(xml, certificate);
    request.element_id = args.element_id;
    request.signature_tag = args.tag;

    let result = XmlSigner::new(config.signer_options()).sign(&request);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        if !result.success {
            bail!("Signing failed");
        }
        return Ok(());
    }

    let signed_xml = result.into_result().wrap_err("Signing failed")?;
    match args.output {
        Some(path) => fs::write(&path, signed_xml)
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?,
        None => println!("{signed_xml}"),
    }
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<()> {
    let xml = fs::read_to_string(&args.input)
        .wrap_err_with(|| format!("Failed to read {}", args.input.display()))?;

    let outcome = XmlSignatureVerifier::new().verify(&xml);
    println!("{outcome}");
    if !outcome.is_valid() {
        bail!("Verification failed: {outcome}");
    }
    Ok(())
}

fn info(config: &Config, args: CertificateArgs) -> Result<()> {
    let (path, passphrase) = certificate_source(config, &args)?;
    let archive = fs::read(&path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;

    let info = XmlSigner::default()
        .certificate_info(&CertificateBundle::new(archive, passphrase))
        .wrap_err("Failed to read certificate")?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn generate_archive(args: GenerateArgs) -> Result<()> {
    if args.days <= 0 {
        bail!("--days must be positive");
    }

    let now = Utc::now();
    let spec = cert_utils::CertificateSpec::new(args.common_name)
        .valid_between(now - Duration::minutes(5), now + Duration::days(args.days));
    let archive = cert_utils::generate_archive(&spec, &args.passphrase)
        .wrap_err("Failed to generate certificate archive")?;

    fs::write(&args.output, archive)
        .wrap_err_with(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Development archive written to {}", args.output.display());
    Ok(())
}

fn certificate_source(config: &Config, args: &CertificateArgs) -> Result<(PathBuf, String)> {
    let path = args
        .certificate
        .clone()
        .or_else(|| config.certificate.path.clone())
        .ok_or_else(|| eyre!("No certificate given, pass --certificate or set XMLSIGNER_CERTIFICATE__PATH"))?;
    let passphrase = args
        .passphrase
        .clone()
        .or_else(|| {
            config
                .certificate
                .passphrase
                .as_ref()
                .map(|secret| secret.expose_secret().to_string())
        })
        .ok_or_else(|| eyre!("No passphrase given, pass --passphrase or set XMLSIGNER_CERTIFICATE__PASSPHRASE"))?;
    Ok((path, passphrase))
}

fn load_bundle(config: &Config, args: &CertificateArgs) -> Result<CertificateBundle> {
    let (path, passphrase) = certificate_source(config, args)?;
    CertificateBundle::from_path(&path, passphrase)
        .wrap_err_with(|| format!("Failed to load certificate archive {}", path.display()))
}
