#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::Utc;
use surveykit_contracts::audit::{AuditAction, AuditEntityType};
use surveykit_contracts::survey::{ParameterId, SurveyId};
use surveykit_engines::analytics::{
    AnalyticsConfig, AnalyticsEngine, AnalyticsQuery, AnalyticsRange,
};
use surveykit_engines::audit_query::{AuditLogFilter, AuditSummary};
use surveykit_engines::param_codec::ParamCodec;
use surveykit_os::demo_seed::{seed_demo_data, DemoSeedOutcome};
use surveykit_os::survey_manager::{parameter_preset, PARAMETER_PRESETS};
use surveykit_os::{RevealMode, SurveyManager, SurveyViewer};
use surveykit_storage::audit::AuditRecorder;
use surveykit_storage::repo::{SurveyRepo, SurveyResponseRepo};
use surveykit_storage::{KeyValueStore, SurveyStore};

use crate::config::SurveyKitConfig;

pub const USAGE: &str = "usage: surveykit <codec|survey|param|link|view|respond|audit|analytics|demo> ...";
pub const DEFAULT_USER_AGENT: &str = "surveykit-cli";

/// Everything a command needs, wired over one key-value store.
pub struct SurveyCli<K> {
    store: SurveyStore<K>,
    codec: ParamCodec,
    recorder: AuditRecorder,
    manager: SurveyManager,
    viewer: SurveyViewer,
    analytics: AnalyticsEngine,
}

impl<K: KeyValueStore> SurveyCli<K> {
    pub fn new(config: &SurveyKitConfig, kv: K) -> Result<Self, String> {
        let codec = ParamCodec::default();
        let recorder = AuditRecorder::default();
        let manager = SurveyManager::new(config.manager_config(), codec.clone(), recorder.clone())
            .map_err(|e| format!("invalid configuration: {e}"))?;
        let viewer = SurveyViewer::new(config.viewer_config()?, codec.clone(), recorder.clone())
            .map_err(|e| format!("invalid configuration: {e}"))?;
        Ok(Self {
            store: SurveyStore::new(kv),
            analytics: AnalyticsEngine::new(AnalyticsConfig::mvp_v1(), codec.clone()),
            codec,
            recorder,
            manager,
            viewer,
        })
    }

    pub fn store(&self) -> &SurveyStore<K> {
        &self.store
    }
}

/// Positional arguments plus `--flag [value]` options. Everything after a bare `--` is positional.
struct ParsedArgs<'a> {
    positional: Vec<&'a str>,
    options: BTreeMap<&'a str, &'a str>,
    switches: Vec<&'a str>,
}

impl<'a> ParsedArgs<'a> {
    fn parse(
        args: &'a [String],
        value_options: &[&str],
        switches: &[&str],
    ) -> Result<Self, String> {
        let mut parsed = ParsedArgs {
            positional: Vec::new(),
            options: BTreeMap::new(),
            switches: Vec::new(),
        };
        let mut iter = args.iter().map(String::as_str);
        while let Some(arg) = iter.next() {
            if arg == "--" {
                parsed.positional.extend(iter.by_ref());
                break;
            }
            let Some(name) = arg.strip_prefix("--") else {
                parsed.positional.push(arg);
                continue;
            };
            if value_options.contains(&name) {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("option --{name} requires a value"))?;
                parsed.options.insert(name, value);
            } else if switches.contains(&name) {
                parsed.switches.push(name);
            } else {
                return Err(format!("unknown option: --{name}"));
            }
        }
        Ok(parsed)
    }

    fn arg(&self, idx: usize, what: &str) -> Result<&'a str, String> {
        self.positional
            .get(idx)
            .copied()
            .ok_or_else(|| format!("missing {what}"))
    }

    fn option(&self, name: &str) -> Option<&'a str> {
        self.options.get(name).copied()
    }

    fn switch(&self, name: &str) -> bool {
        self.switches.contains(&name)
    }
}

pub fn execute_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let (command, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;
    match command.as_str() {
        "codec" => execute_codec_command(cli, rest),
        "survey" => execute_survey_command(cli, rest),
        "param" => execute_param_command(cli, rest),
        "link" => execute_link_command(cli, rest),
        "view" => execute_view_command(cli, rest),
        "respond" => execute_respond_command(cli, rest),
        "audit" => execute_audit_command(cli, rest),
        "analytics" => execute_analytics_command(cli, rest),
        "demo" => execute_demo_command(cli, rest),
        other => Err(format!("unknown command: {other}. {USAGE}")),
    }
}

fn execute_codec_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &[], &["strict"])?;
    let subcommand = p.arg(0, "codec subcommand (encode, decode, check)")?;
    let value = p.arg(1, "value")?;
    match subcommand {
        "encode" => cli
            .codec
            .try_encode(value)
            .map_err(|e| format!("failed to encode value: {e}")),
        "decode" if p.switch("strict") => cli
            .codec
            .try_decode(value)
            .map_err(|e| format!("failed to decode value: {e}")),
        "decode" => Ok(cli.codec.decode(value)),
        "check" => Ok(yes_no(cli.codec.is_encoded(value))),
        _ => Err(format!(
            "unknown codec subcommand: {subcommand}. expected one of: encode, decode, check"
        )),
    }
}

fn execute_survey_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &["description"], &[])?;
    let subcommand = p.arg(0, "survey subcommand (create, ls, show, activate, deactivate)")?;
    match subcommand {
        "create" => {
            let name = p.arg(1, "survey name")?;
            let description = p.option("description").unwrap_or("");
            let survey = cli
                .manager
                .create_survey(&mut cli.store, name, description)
                .map_err(|e| format!("failed to create survey: {e}"))?;
            Ok(survey.id.to_string())
        }
        "ls" => Ok(cli
            .manager
            .list_surveys(&cli.store)
            .iter()
            .map(|s| {
                format!(
                    "{}\t{}\t{} params\t{}",
                    s.id,
                    if s.is_active { "active" } else { "inactive" },
                    s.parameters.len(),
                    s.name
                )
            })
            .collect::<Vec<_>>()
            .join("\n")),
        "show" => {
            let id = parse_survey_id(p.arg(1, "survey id")?)?;
            let survey = cli
                .manager
                .find_survey(&cli.store, &id)
                .map_err(|e| e.to_string())?;
            let mut lines = vec![
                format!("{} ({})", survey.name, survey.id),
                survey.description.clone(),
            ];
            lines.extend(survey.parameters.iter().map(|param| {
                format!(
                    "{}\t{}\t{}\t{}",
                    param.id,
                    param.name,
                    cli.manager.masked_value(param),
                    if param.is_encrypted { "encoded" } else { "plain" }
                )
            }));
            Ok(lines.join("\n"))
        }
        "activate" | "deactivate" => {
            let id = parse_survey_id(p.arg(1, "survey id")?)?;
            cli.manager
                .set_survey_active(&mut cli.store, &id, subcommand == "activate")
                .map_err(|e| format!("failed to update survey: {e}"))?;
            Ok("OK".to_string())
        }
        _ => Err(format!(
            "unknown survey subcommand: {subcommand}. expected one of: create, ls, show, activate, deactivate"
        )),
    }
}

fn execute_param_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &[], &["plain", "encrypt"])?;
    let subcommand = p.arg(0, "param subcommand (add, rm, presets)")?;
    match subcommand {
        "add" => {
            let survey_id = parse_survey_id(p.arg(1, "survey id")?)?;
            let name = p.arg(2, "parameter name")?;
            let value = p.arg(3, "parameter value")?;
            let encrypt = match (p.switch("plain"), p.switch("encrypt")) {
                (true, true) => return Err("--plain and --encrypt are exclusive".to_string()),
                (true, false) => false,
                (false, true) => true,
                (false, false) => parameter_preset(name).map_or(true, |preset| preset.encrypt),
            };
            let param = cli
                .manager
                .add_parameter(&mut cli.store, &survey_id, name, value, encrypt)
                .map_err(|e| format!("failed to add parameter: {e}"))?;
            Ok(param.id.to_string())
        }
        "rm" => {
            let survey_id = parse_survey_id(p.arg(1, "survey id")?)?;
            let param_id = ParameterId::new(p.arg(2, "parameter id")?)
                .map_err(|e| format!("invalid parameter id: {e}"))?;
            cli.manager
                .delete_parameter(&mut cli.store, &survey_id, &param_id)
                .map_err(|e| format!("failed to delete parameter: {e}"))?;
            Ok("OK".to_string())
        }
        "presets" => Ok(PARAMETER_PRESETS
            .iter()
            .map(|preset| {
                format!(
                    "{}\t{}\t{}\te.g. {}",
                    preset.name,
                    preset.label,
                    if preset.encrypt { "encoded" } else { "plain" },
                    preset.example
                )
            })
            .collect::<Vec<_>>()
            .join("\n")),
        _ => Err(format!(
            "unknown param subcommand: {subcommand}. expected one of: add, rm, presets"
        )),
    }
}

fn execute_link_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &[], &["tagged"])?;
    let subcommand = p.arg(0, "link subcommand (url, embed)")?;
    let id = parse_survey_id(p.arg(1, "survey id")?)?;
    let survey = cli
        .manager
        .find_survey(&cli.store, &id)
        .map_err(|e| e.to_string())?;
    let reveal = if p.switch("tagged") {
        RevealMode::Tagged
    } else {
        RevealMode::Decoded
    };
    match subcommand {
        "url" => Ok(cli.manager.share_url(&survey, reveal)),
        "embed" => Ok(cli.manager.embed_code(&survey, reveal)),
        _ => Err(format!(
            "unknown link subcommand: {subcommand}. expected one of: url, embed"
        )),
    }
}

fn execute_view_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &["ua"], &[])?;
    let link = p.arg(0, "survey link")?;
    let user_agent = p.option("ua").unwrap_or(DEFAULT_USER_AGENT);
    let view = cli
        .viewer
        .open(&mut cli.store, link, user_agent)
        .map_err(|e| format!("failed to open survey: {e}"))?;

    let mut lines = vec![format!("{} ({})", view.survey.name, view.survey.id)];
    lines.extend(
        view.parameters
            .iter()
            .map(|(name, value)| format!("{name}={value}")),
    );
    Ok(lines.join("\n"))
}

fn execute_respond_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &["ip", "ua"], &[])?;
    let link = p.arg(0, "survey link")?;
    let user_agent = p.option("ua").unwrap_or(DEFAULT_USER_AGENT);
    let view = cli
        .viewer
        .open(&mut cli.store, link, user_agent)
        .map_err(|e| format!("failed to open survey: {e}"))?;
    let response = cli
        .viewer
        .submit_response(&mut cli.store, &view, p.option("ip"), user_agent)
        .map_err(|e| format!("failed to submit response: {e}"))?;
    Ok(response.id.to_string())
}

fn execute_audit_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &["action", "entity", "search"], &[])?;
    let subcommand = p.arg(0, "audit subcommand (ls, summary)")?;
    let logs = cli.recorder.list(&cli.store);
    match subcommand {
        "ls" => {
            let mut filter = AuditLogFilter::all();
            if let Some(raw) = p.option("action") {
                let action: AuditAction = raw.parse().map_err(|e| format!("{e}"))?;
                filter = filter.with_action(action);
            }
            if let Some(raw) = p.option("entity") {
                let entity: AuditEntityType = raw.parse().map_err(|e| format!("{e}"))?;
                filter = filter.with_entity_type(entity);
            }
            if let Some(term) = p.option("search") {
                filter = filter.with_search(term);
            }
            Ok(filter
                .apply(&logs)
                .iter()
                .map(|l| {
                    format!(
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        l.timestamp.to_rfc3339(),
                        l.action,
                        l.entity_type,
                        l.entity_id,
                        l.user_id,
                        l.details
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "summary" => {
            let s = AuditSummary::compute(&logs, Utc::now());
            Ok(format!(
                "total={} encrypt={} users={} last_24h={}",
                s.total, s.encrypt_events, s.unique_users, s.last_24h
            ))
        }
        _ => Err(format!(
            "unknown audit subcommand: {subcommand}. expected one of: ls, summary"
        )),
    }
}

fn execute_analytics_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &["survey", "range"], &[])?;
    let range = match p.option("range") {
        Some(raw) => raw.parse::<AnalyticsRange>()?,
        None => AnalyticsRange::default(),
    };
    let survey_id = p.option("survey").map(parse_survey_id).transpose()?;
    let query = AnalyticsQuery { survey_id, range };

    let report = cli.analytics.compute(
        &cli.store.load_surveys(),
        &cli.store.load_responses(),
        &query,
        Utc::now(),
    );

    let stats = report.stats;
    let mut lines = vec![
        format!("range={range}"),
        format!("responses={}", stats.total_responses),
        format!("active_surveys={}", stats.active_surveys),
        format!("encoded_parameters={}", stats.encrypted_parameters),
        format!("unique_visitors={}", stats.unique_visitors),
    ];
    for breakdown in &report.parameters {
        lines.push(format!("[{}]", breakdown.name));
        lines.extend(breakdown.top_values.iter().map(|v| {
            format!("  {}\t{}\t{:.1}%", v.value, v.count, v.percentage)
        }));
    }
    if !report.recent.is_empty() {
        lines.push("recent:".to_string());
        lines.extend(report.recent.iter().map(|r| {
            format!(
                "  {}\t{}\t{}",
                r.timestamp.to_rfc3339(),
                r.survey_name,
                r.parameter_names.join(",")
            )
        }));
    }
    Ok(lines.join("\n"))
}

fn execute_demo_command<K: KeyValueStore>(
    cli: &mut SurveyCli<K>,
    args: &[String],
) -> Result<String, String> {
    let p = ParsedArgs::parse(args, &[], &[])?;
    match p.arg(0, "demo subcommand (seed)")? {
        "seed" => {
            let outcome = seed_demo_data(&mut cli.store, &cli.codec, &cli.recorder)
                .map_err(|e| format!("failed to seed demo data: {e}"))?;
            Ok(match outcome {
                DemoSeedOutcome::Seeded {
                    surveys,
                    audit_entries,
                } => format!("seeded {surveys} surveys ({audit_entries} audit entries)"),
                DemoSeedOutcome::SkippedNotEmpty { existing } => {
                    format!("skipped: {existing} surveys already stored")
                }
            })
        }
        other => Err(format!(
            "unknown demo subcommand: {other}. expected one of: seed"
        )),
    }
}

fn parse_survey_id(raw: &str) -> Result<SurveyId, String> {
    SurveyId::new(raw).map_err(|e| format!("invalid survey id: {e}"))
}

fn yes_no(flag: bool) -> String {
    if flag {
        "YES".to_string()
    } else {
        "NO".to_string()
    }
}
