mod document;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

use tideline_core::differ::{create_plan, destroy_plan};
use tideline_core::effect::Effect;
use tideline_core::interpreter::{ApplyResult, EffectOutcome, Interpreter, InterpreterConfig};
use tideline_core::plan::Plan;
use tideline_core::provider::Provider;
use tideline_core::resource::{Resource, ResourceId, State, Value};
use tideline_core::schema::ResourceSchema;
use tideline_provider_aws::AwsProvider;
use tideline_provider_aws::schemas;
use tideline_provider_aws::settings::ProviderSettings;

use crate::document::Document;

#[derive(Parser)]
#[command(name = "tideline")]
#[command(about = "Reconcile AWS scheduled actions and DB security groups", long_about = None)]
struct Cli {
    /// AWS region, overriding the document's provider section
    #[arg(long, global = true)]
    region: Option<String>,

    /// Log requests and convergence progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the document without contacting AWS
    Validate {
        #[arg(default_value = "tideline.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = "tideline.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = "tideline.json")]
        file: PathBuf,

        /// Keep applying after a failed effect
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Show the current remote state of every resource
    Show {
        #[arg(default_value = "tideline.json")]
        file: PathBuf,
    },
    /// Destroy all resources defined in the document
    Destroy {
        #[arg(default_value = "tideline.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let region = cli.region.as_deref();
    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file, region).await,
        Commands::Apply {
            file,
            continue_on_error,
        } => run_apply(&file, region, continue_on_error).await,
        Commands::Show { file } => run_show(&file, region).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, region, auto_approve).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `-v`
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    let mut all_schemas = HashMap::new();
    for schema in schemas::all_schemas() {
        all_schemas.insert(schema.resource_type.clone(), schema);
    }
    all_schemas
}

fn validate_resources(resources: &[Resource]) -> Result<(), String> {
    let schemas = get_schemas();
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
            None => all_errors.push(format!(
                "{}: unknown resource type '{}'",
                resource.id, resource.id.resource_type
            )),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        all_errors.sort();
        Err(all_errors.join("\n"))
    }
}

/// Document settings with command-line overrides applied
fn effective_settings(document: &Document, region: Option<&str>) -> ProviderSettings {
    let mut settings = document.provider.clone();
    if let Some(region) = region {
        settings.region = region.to_string();
    }
    settings
}

fn load(file: &Path) -> Result<(Document, Vec<Resource>), String> {
    let document = Document::load(file)?;
    let resources = document.resources();
    debug!("loaded {} resources from {}", resources.len(), file.display());
    validate_resources(&resources)?;
    Ok((document, resources))
}

async fn read_states(
    provider: &dyn Provider,
    resources: &[Resource],
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current_states = HashMap::new();
    for resource in resources {
        let state = provider
            .read(resource, None)
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        debug!("{}: exists={}", resource.id, state.exists);
        current_states.insert(resource.id.clone(), state);
    }
    Ok(current_states)
}

fn run_validate(file: &Path) -> Result<(), String> {
    let (_document, resources) = load(file)?;
    println!(
        "{}",
        format!("Configuration is valid ({} resources).", resources.len()).green()
    );
    Ok(())
}

async fn run_plan(file: &Path, region: Option<&str>) -> Result<(), String> {
    let (document, resources) = load(file)?;
    let provider = AwsProvider::new(&effective_settings(&document, region)).await;

    let schemas = get_schemas();
    let current_states = read_states(&provider, &resources).await?;
    let plan = create_plan(&resources, &current_states, &schemas);
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(file: &Path, region: Option<&str>, continue_on_error: bool) -> Result<(), String> {
    let (document, resources) = load(file)?;
    let provider = AwsProvider::new(&effective_settings(&document, region)).await;

    let schemas = get_schemas();
    let current_states = read_states(&provider, &resources).await?;
    let plan = create_plan(&resources, &current_states, &schemas);
    print_plan(&plan, &schemas);
    if plan.is_empty() {
        return Ok(());
    }

    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        continue_on_error,
        ..Default::default()
    });
    let result = interpreter.apply(&plan).await;
    print_apply_result(&plan, &result);

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_show(file: &Path, region: Option<&str>) -> Result<(), String> {
    let (document, resources) = load(file)?;
    let provider = AwsProvider::new(&effective_settings(&document, region)).await;

    for resource in &resources {
        let state = provider
            .read(resource, None)
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;

        if !state.exists {
            println!("{} {}", resource.id.to_string().cyan().bold(), "(absent)".dimmed());
            continue;
        }
        println!(
            "{} {}",
            resource.id.to_string().cyan().bold(),
            format!("[{}]", state.identifier.as_deref().unwrap_or("")).dimmed()
        );
        print_attributes(&state.attributes, "    ");
        println!();
    }
    Ok(())
}

async fn run_destroy(file: &Path, region: Option<&str>, auto_approve: bool) -> Result<(), String> {
    let (document, resources) = load(file)?;

    if resources.is_empty() {
        println!("{}", "No resources defined in configuration.".yellow());
        return Ok(());
    }

    let provider = AwsProvider::new(&effective_settings(&document, region)).await;
    let current_states = read_states(&provider, &resources).await?;
    let plan = destroy_plan(&resources, &current_states);

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        plan.effects().len().to_string().red()
    );
    println!();

    if !auto_approve && !confirm_destroy()? {
        println!();
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        continue_on_error: true,
        ..Default::default()
    });
    let result = interpreter.apply(&plan).await;
    print_apply_result(&plan, &result);

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!(
                "Destroy complete! {} resources destroyed.",
                result.success_count
            )
            .green()
            .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

fn confirm_destroy() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?"
            .yellow()
            .bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

/// Changed attributes that can only be set at creation
fn create_only_changes<'a>(
    resource_type: &str,
    changed_attributes: &'a [String],
    schemas: &HashMap<String, ResourceSchema>,
) -> Vec<&'a str> {
    let Some(schema) = schemas.get(resource_type) else {
        return Vec::new();
    };
    changed_attributes
        .iter()
        .filter(|name| schema.attributes.get(*name).is_some_and(|a| a.create_only))
        .map(String::as_str)
        .collect()
}

fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        match effect {
            Effect::Create(resource) => {
                println!("  {} {}", "+".green().bold(), resource.id.to_string().cyan().bold());
                print_attributes(&resource.attributes, "      ");
            }
            Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
                let create_only =
                    create_only_changes(&id.resource_type, changed_attributes, schemas);
                for name in changed_attributes {
                    let old = from
                        .attributes
                        .get(name)
                        .map(Value::to_string)
                        .unwrap_or_else(|| "(unset)".to_string());
                    let new = to
                        .attributes
                        .get(name)
                        .map(Value::to_string)
                        .unwrap_or_else(|| "(remote default)".to_string());
                    println!(
                        "      {}: {} {} {}",
                        name,
                        old.red(),
                        "->".dimmed(),
                        new.green()
                    );
                }
                if !create_only.is_empty() {
                    println!(
                        "      {}",
                        format!(
                            "# {} cannot change after creation; delete and recreate instead",
                            create_only.join(", ")
                        )
                        .red()
                    );
                }
            }
            Effect::Delete { resource, .. } => {
                println!("  {} {}", "-".red().bold(), resource.id.to_string().cyan().bold());
            }
        }
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
}

fn print_apply_result(plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(EffectOutcome::Skipped { reason }) => {
                println!("  {} {} ({})", "-".dimmed(), effect, reason);
            }
            Ok(_) => println!("  {} {}", "✓".green(), effect),
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), effect, e);
                for failure in e.failures() {
                    println!("      {} {}", "·".red(), failure);
                }
            }
        }
    }
}

fn print_attributes(attributes: &HashMap<String, Value>, indent: &str) {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();
    for key in keys {
        println!("{}{}: {}", indent, key, attributes[key]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled_action(group: Option<&str>) -> Resource {
        let mut resource = Resource::new("autoscaling_scheduled_action", "nightly").with_attribute(
            "scheduled_action_name",
            Value::String("nightly".to_string()),
        );
        if let Some(group) = group {
            resource = resource.with_attribute(
                "autoscaling_group_name",
                Value::String(group.to_string()),
            );
        }
        resource
    }

    #[test]
    fn validate_accepts_known_resources() {
        assert!(validate_resources(&[scheduled_action(Some("web-asg"))]).is_ok());
    }

    #[test]
    fn validate_reports_missing_attributes() {
        let err = validate_resources(&[scheduled_action(None)]).unwrap_err();
        assert!(err.contains("autoscaling_scheduled_action.nightly"));
        assert!(err.contains("autoscaling_group_name"));
    }

    #[test]
    fn validate_rejects_unknown_types() {
        let err = validate_resources(&[Resource::new("s3_bucket", "logs")]).unwrap_err();
        assert!(err.contains("unknown resource type 's3_bucket'"));
    }

    #[test]
    fn region_flag_overrides_document() {
        let document = Document::parse(
            r#"{ "provider": { "region": "eu-west-1" }, "resources": [] }"#,
        )
        .unwrap();
        assert_eq!(effective_settings(&document, None).region, "eu-west-1");
        assert_eq!(
            effective_settings(&document, Some("ap-northeast-1")).region,
            "ap-northeast-1"
        );
    }

    #[test]
    fn create_only_changes_are_flagged() {
        let changed = vec![
            "autoscaling_group_name".to_string(),
            "desired_capacity".to_string(),
        ];
        let schemas = get_schemas();
        assert_eq!(
            create_only_changes("autoscaling_scheduled_action", &changed, &schemas),
            vec!["autoscaling_group_name"]
        );
        assert!(create_only_changes("s3_bucket", &changed, &schemas).is_empty());
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["tideline", "destroy", "--auto-approve", "--region", "us-west-2", "-v"])
            .unwrap();
        assert_eq!(cli.region.as_deref(), Some("us-west-2"));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Destroy {
                auto_approve: true,
                ..
            }
        ));
    }
}
