//! CLI subcommand handlers.

use crate::AnalysisAction;
use crate::AuditAction;
use crate::Commands;
use crate::ConfigAction;
use crate::DatasetAction;
use crate::JobAction;
use crate::ModelAction;
use crate::SchemaAction;
use crate::TagAction;
use datadesk_core::config::{DeskConfig, workspace_config_path};
use datadesk_core::{
    AuditEvent, AuditQuery, DatasetFilter, DatasetStatus, Hyperparameters, JobFilter, JobKind,
    JobStatus, JobTarget, NewDataset, NewModel, NewModelVersion, NewTemplate, ParameterSpec,
    Parameters, SchemaDefinition, SourceType, TagCategory, TargetRef,
};
use datadesk_ml::{Desk, PredictRequest};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::Path;

/// Resolve configuration for `workspace`, with an optional explicit file
/// taking precedence over every other source.
///
/// Validation problems are returned for the caller to report once logging
/// is set up.
pub fn load_config(
    workspace: &Path,
    explicit: Option<&Path>,
) -> anyhow::Result<(DeskConfig, Vec<String>)> {
    if let Some(path) = explicit {
        anyhow::ensure!(path.is_file(), "Config file not found: {}", path.display());
    }
    let config = datadesk_core::config::load_config_with_file(Some(workspace), explicit, None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    let problems = config.validate();
    Ok((config, problems))
}

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config: &DeskConfig,
) -> anyhow::Result<()> {
    if let Commands::Config { action } = command {
        return handle_config(action, workspace, config);
    }

    let desk = Desk::open(config, workspace)?;
    match command {
        Commands::Config { .. } => Ok(()),
        Commands::Tag { action } => handle_tag(action, &desk),
        Commands::Schema { action } => handle_schema(action, &desk),
        Commands::Dataset { action } => handle_dataset(action, &desk),
        Commands::Analysis { action } => handle_analysis(action, &desk),
        Commands::Model { action } => handle_model(action, &desk),
        Commands::Job { action } => handle_job(action, &desk),
        Commands::Audit { action } => handle_audit(action, &desk),
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse an optional JSON argument, naming the flag on failure.
fn parse_json(flag: &str, raw: Option<&str>) -> anyhow::Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("--{flag} is not valid JSON: {e}")),
        None => Ok(Value::Null),
    }
}

/// Parse `type:id`, e.g. `dataset:3` or `model_version:12`.
fn parse_target(raw: &str) -> anyhow::Result<TargetRef> {
    let (kind, id) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Target must look like TYPE:ID, got '{raw}'"))?;
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("'{id}' is not a record id"))?;
    serde_json::from_value(json!({"target_type": kind.trim(), "target_id": id}))
        .map_err(|_| anyhow::anyhow!("Unknown target type: '{kind}'"))
}

/// Read a schema definition, as JSON when the extension says so and as
/// TOML otherwise.
fn read_schema_definition(path: &Path) -> anyhow::Result<SchemaDefinition> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(toml::from_str(&text)?)
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: &DeskConfig,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let default_config = DeskConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

fn handle_tag(action: TagAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        TagAction::Create {
            name,
            category,
            description,
        } => {
            let category: TagCategory = category.parse()?;
            emit(&desk.store().create_tag(&name, category, &description)?)
        }
        TagAction::List { category } => {
            let category = category
                .map(|c| c.parse::<TagCategory>())
                .transpose()?;
            emit(&desk.store().list_tags(category)?)
        }
    }
}

fn handle_schema(action: SchemaAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        SchemaAction::Create { tag, file } => {
            let definition = read_schema_definition(&file)?;
            emit(&desk.store().create_schema(tag, &definition)?)
        }
        SchemaAction::Show { id } => emit(&desk.store().get_schema(id)?),
        SchemaAction::List { tag } => emit(&desk.store().list_schemas(tag)?),
    }
}

fn handle_dataset(action: DatasetAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        DatasetAction::Register {
            name,
            tag,
            schema,
            description,
            source_type,
            source_info,
        } => {
            let new = NewDataset {
                name,
                tag_id: tag,
                schema_id: schema,
                description,
                source_type: source_type.parse::<SourceType>()?,
                source_info,
            };
            emit(&desk.register_dataset(&new)?)
        }
        DatasetAction::AddFile {
            dataset,
            path,
            format,
            position,
        } => {
            let path = std::path::absolute(&path)?;
            emit(&desk.add_dataset_file(dataset, &path, format.as_deref(), position)?)
        }
        DatasetAction::Validate { id } => emit(&desk.validate_dataset(id)?),
        DatasetAction::Profile { id } => emit(&desk.profile_dataset(id)?),
        DatasetAction::Show { id } => {
            let dataset = desk.store().get_dataset(id)?;
            let files = desk.store().dataset_files(id)?;
            let profile = desk.store().get_profile(id)?;
            emit(&json!({
                "dataset": dataset,
                "files": files,
                "profile": profile,
            }))
        }
        DatasetAction::List { tag, status } => {
            let filter = DatasetFilter {
                tag_id: tag,
                status: status.map(|s| s.parse::<DatasetStatus>()).transpose()?,
            };
            emit(&desk.store().list_datasets(&filter)?)
        }
        DatasetAction::Archive { id } => emit(&desk.archive_dataset(id)?),
    }
}

fn handle_analysis(action: AnalysisAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        AnalysisAction::Template {
            name,
            key,
            tag,
            description,
            params_schema,
        } => {
            let parameter_schema: Vec<ParameterSpec> = match params_schema {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("--params-schema is not valid: {e}"))?,
                None => Vec::new(),
            };
            let new = NewTemplate {
                name,
                tag_id: tag,
                description,
                code_identifier: key,
                parameter_schema,
            };
            emit(&desk.create_template(&new)?)
        }
        AnalysisAction::RunCreate {
            template,
            dataset,
            params,
        } => {
            let parameters = Parameters::from_value(parse_json("params", params.as_deref())?)?;
            emit(&desk.create_analysis_run(template, dataset, parameters)?)
        }
        AnalysisAction::Run { id } => emit(&desk.run_analysis(id)?),
        AnalysisAction::Show { id } => emit(&desk.store().get_analysis_run(id)?),
        AnalysisAction::Templates => emit(&desk.store().list_templates()?),
        AnalysisAction::Runs { dataset } => emit(&desk.store().list_analysis_runs(dataset)?),
    }
}

fn handle_model(action: ModelAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        ModelAction::Create {
            name,
            tag,
            task_type,
            description,
            inactive,
        } => {
            let mut new = NewModel::new(name, tag, task_type);
            new.description = description;
            new.is_active = !inactive;
            emit(&desk.create_model(&new)?)
        }
        ModelAction::Activate { id, off } => emit(&desk.set_model_active(id, !off)?),
        ModelAction::Version {
            model,
            version,
            dataset,
            hyperparams,
            description,
        } => {
            let new = NewModelVersion {
                version,
                dataset_id: dataset,
                hyperparams: Hyperparameters::from_value(parse_json(
                    "hyperparams",
                    hyperparams.as_deref(),
                )?)?,
                description,
                created_by: None,
            };
            let (version, training_run) = desk.create_model_version(model, &new)?;
            emit(&json!({"version": version, "training_run": training_run}))
        }
        ModelAction::Train { version } => emit(&desk.train_model(version)?),
        ModelAction::Deprecate { version } => emit(&desk.deprecate_version(version)?),
        ModelAction::Predict {
            version,
            tag,
            inputs,
        } => {
            let inputs: Vec<Value> = serde_json::from_str(&inputs)
                .map_err(|e| anyhow::anyhow!("--inputs must be a JSON array: {e}"))?;
            let request = PredictRequest {
                model_version_id: version,
                tag_name: tag,
                inputs,
            };
            emit(&desk.predict(&request)?)
        }
        ModelAction::List { tag } => emit(&desk.store().list_models(tag)?),
        ModelAction::Versions { model } => {
            desk.store().get_model(model)?;
            emit(&desk.store().list_model_versions(model)?)
        }
    }
}

fn handle_job(action: JobAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        JobAction::Create {
            kind,
            target,
            priority,
            queue,
        } => {
            let target = match kind.parse::<JobKind>()? {
                JobKind::AnalysisRun => JobTarget::AnalysisRun(target),
                JobKind::MlTraining => JobTarget::MlTraining(target),
            };
            emit(&desk.create_job(target, priority, queue.as_deref())?)
        }
        JobAction::Run { id } => emit(&desk.execute_job(id)?),
        JobAction::Cancel { id } => {
            let canceled = desk.cancel_job(id)?;
            emit(&json!({"job_id": id, "canceled": canceled}))
        }
        JobAction::Pending { queue, limit } => emit(&desk.pending_jobs(queue.as_deref(), limit)?),
        JobAction::Drain { queue, limit } => emit(&desk.run_pending(queue.as_deref(), limit)?),
        JobAction::Show { id } => emit(&desk.store().get_job(id)?),
        JobAction::List {
            status,
            queue,
            limit,
        } => {
            let filter = JobFilter {
                status: status.map(|s| s.parse::<JobStatus>()).transpose()?,
                queue,
                limit: Some(limit),
            };
            emit(&desk.store().list_jobs(&filter)?)
        }
    }
}

fn handle_audit(action: AuditAction, desk: &Desk) -> anyhow::Result<()> {
    match action {
        AuditAction::List {
            event,
            target,
            limit,
        } => {
            let query = AuditQuery {
                event_type: event.map(|e| e.parse::<AuditEvent>()).transpose()?,
                target: target.as_deref().map(parse_target).transpose()?,
                limit: Some(limit),
            };
            emit(&desk.store().list_audit(&query)?)
        }
    }
}
