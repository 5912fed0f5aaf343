// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use pedidos_api::{Client, EnvToken};
use pedidos_app::{
    IncompleteProfile, OrderBackend, Role, Section, UserDirectory, UserEdit, UserId, UserProfile,
    WizardState, authorize, edit_user,
};
use pedidos_testkit::DemoBackend;
use runtime::BackendRuntime;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `pedidos --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    let log_path = config.log_path()?;
    logging::init(&log_path, config.log_level())?;
    info!(
        config = %options.config_path.display(),
        demo = options.demo,
        "starting pedidos"
    );

    if options.demo {
        return run_with_backend(DemoBackend::new(), &options, &config);
    }

    let session = Arc::new(EnvToken::new(config.token_env()));
    let client = Client::new(&config.api_base_url(), config.api_timeout()?, session)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    run_with_backend(client, &options, &config)
}

fn run_with_backend<B>(backend: B, options: &CliOptions, config: &Config) -> Result<()>
where
    B: OrderBackend + UserDirectory + Clone + Send + 'static,
{
    let profile = backend.current_profile().map_err(|error| {
        if error.is::<IncompleteProfile>() {
            error
        } else {
            error.context("load the signed-in profile -- check the access token and api.base_url")
        }
    })?;
    let role = authorize(&profile)?;
    info!(user = %profile.id, role = role.as_str(), "signed in");

    if options.check_only {
        println!("ok: {} signed in as {}", profile.email, role.as_str());
        return Ok(());
    }

    match &options.command {
        Command::Wizard => {
            require_section(role, Section::CreateOrder)?;
            let wizard_options =
                config.wizard_options(Some(format!("{} ({})", profile.full_name, role.as_str())))?;
            let mut state = WizardState::default();
            let mut runtime = BackendRuntime::new(backend);
            pedidos_tui::run_app(&mut state, &mut runtime, wizard_options)
        }
        Command::Whoami => {
            print!("{}", describe_profile(&profile, role));
            Ok(())
        }
        Command::Users(command) => {
            print!("{}", run_user_command(&backend, role, command)?);
            Ok(())
        }
    }
}

fn require_section(role: Role, section: Section) -> Result<()> {
    if !role.can_access(section) {
        let allowed = section
            .allowed_roles()
            .iter()
            .map(|allowed| allowed.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        bail!(
            "{} is only available to {allowed} users; signed in as {}",
            section.label(),
            role.as_str()
        );
    }
    Ok(())
}

fn describe_profile(profile: &UserProfile, role: Role) -> String {
    let sections = Section::ALL
        .into_iter()
        .filter(|section| role.can_access(*section))
        .map(Section::label)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}role: {}\nsections: {sections}\n",
        format_profile(profile),
        role.as_str()
    )
}

fn format_profile(profile: &UserProfile) -> String {
    format!(
        "id: {}\nname: {}\nemail: {}\nerp code: {}\nuser type: {}\nactive: {}\n",
        profile.id,
        profile.full_name,
        profile.email,
        if profile.code_erp.is_empty() {
            "-"
        } else {
            profile.code_erp.as_str()
        },
        profile.user_type,
        if profile.is_active { "yes" } else { "no" },
    )
}

fn format_user_table(users: &[UserProfile]) -> String {
    let mut out = format!(
        "{:<20} {:<8} {:<10} {:<6} {}\n",
        "id", "code", "type", "active", "email"
    );
    for user in users {
        out.push_str(&format!(
            "{:<20} {:<8} {:<10} {:<6} {}\n",
            user.id.as_str(),
            if user.code_erp.is_empty() {
                "-"
            } else {
                user.code_erp.as_str()
            },
            user.user_type,
            if user.is_active { "yes" } else { "no" },
            user.email,
        ));
    }
    out
}

fn run_user_command<D: UserDirectory>(
    directory: &D,
    role: Role,
    command: &UserCommand,
) -> Result<String> {
    require_section(role, Section::Users)?;
    match command {
        UserCommand::List => Ok(format_user_table(&directory.list_users()?)),
        UserCommand::Show(id) => Ok(format_profile(&directory.get_user(id)?)),
        UserCommand::Edit { id, edit } => {
            let updated = edit_user(directory, id, edit)?;
            info!(user = %updated.id, "updated user details");
            Ok(format!("updated {}\n{}", updated.id, format_profile(&updated)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UserCommand {
    List,
    Show(UserId),
    Edit { id: UserId, edit: UserEdit },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Wizard,
    Whoami,
    Users(UserCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    check_only: bool,
    show_help: bool,
    command: Command,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        demo: false,
        check_only: false,
        show_help: false,
        command: Command::Wizard,
    };

    let mut command = None;
    let mut edit = UserEdit::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let flag = arg.as_ref();
        let next = match flag {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
                None
            }
            "--print-config-path" => {
                options.print_config_path = true;
                None
            }
            "--print-example-config" => {
                options.print_example = true;
                None
            }
            "--demo" => {
                options.demo = true;
                None
            }
            "--check" => {
                options.check_only = true;
                None
            }
            "--help" | "-h" => {
                options.show_help = true;
                None
            }
            "--whoami" => Some(Command::Whoami),
            "--list-users" => Some(Command::Users(UserCommand::List)),
            "--show-user" => {
                let id = user_id_arg(&mut iter, flag)?;
                Some(Command::Users(UserCommand::Show(id)))
            }
            "--edit-user" => Some(Command::Users(UserCommand::Edit {
                id: user_id_arg(&mut iter, flag)?,
                edit: UserEdit::default(),
            })),
            "--full-name" => {
                edit.full_name = Some(value_arg(&mut iter, flag)?);
                None
            }
            "--email" => {
                edit.email = Some(value_arg(&mut iter, flag)?);
                None
            }
            "--code-erp" => {
                edit.code_erp = Some(value_arg(&mut iter, flag)?);
                None
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        };
        if let Some(next) = next {
            if command.is_some() {
                bail!(
                    "{flag} cannot be combined with another command; pass one of --whoami, --list-users, --show-user or --edit-user"
                );
            }
            command = Some(next);
        }
    }
    match &mut command {
        Some(Command::Users(UserCommand::Edit { edit: slot, .. })) => {
            if edit.is_empty() {
                bail!("--edit-user needs at least one of --full-name, --email or --code-erp");
            }
            *slot = edit;
        }
        _ if !edit.is_empty() => {
            bail!("--full-name, --email and --code-erp only apply to --edit-user <id>");
        }
        _ => {}
    }
    if let Some(command) = command {
        options.command = command;
    }

    Ok(options)
}

fn user_id_arg<I, S>(iter: &mut I, flag: &str) -> Result<UserId>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|value| UserId::new(value.as_ref()))
        .ok_or_else(|| anyhow::anyhow!("{flag} requires a user id"))
}

fn value_arg<I, S>(iter: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|value| value.as_ref().to_owned())
        .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
}

fn print_help() {
    println!("pedidos -- order-entry wizard");
    println!("  --config <path>            Use a specific config path");
    println!("  --print-config-path        Print resolved config path");
    println!("  --print-example-config     Print a config template");
    println!("  --demo                     Run against built-in demo data");
    println!("  --check                    Validate config, credentials and role, then exit");
    println!("  --whoami                   Print the signed-in profile and role");
    println!("  --list-users               List users (admin)");
    println!("  --show-user <id>           Print one user (admin)");
    println!("  --edit-user <id>           Edit a user's details (admin), with:");
    println!("      --full-name <name>");
    println!("      --email <address>");
    println!("      --code-erp <code>");
    println!("  --help                     Show this help");
    println!();
    println!(
        "Log filtering can be overridden with {}=<directives>.",
        logging::LOG_ENV
    );
}

#[cfg(test)]
mod tests {
    use super::{
        CliOptions, Command, UserCommand, describe_profile, parse_cli_args, run_user_command,
    };
    use anyhow::Result;
    use pedidos_app::{IncompleteProfile, Role, UserDirectory, UserEdit, UserId, authorize};
    use pedidos_testkit::DemoBackend;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/pedidos-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_the_wizard() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_example: false,
                demo: false,
                check_only: false,
                show_help: false,
                command: Command::Wizard,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml", "--demo"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        assert!(options.demo);
        Ok(())
    }

    #[test]
    fn parse_cli_args_reads_user_commands() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--code-erp",
                "EMP-020",
                "--edit-user",
                "auth0|employee-1",
                "--email",
                "luis.gomez@premex.example",
            ],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Command::Users(UserCommand::Edit {
                id: UserId::new("auth0|employee-1"),
                edit: UserEdit {
                    full_name: None,
                    email: Some("luis.gomez@premex.example".to_owned()),
                    code_erp: Some("EMP-020".to_owned()),
                },
            })
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_ties_field_flags_to_edit_user() {
        let error = parse_cli_args(vec!["--email", "a@b.example"], default_options_path())
            .expect_err("field without --edit-user should fail");
        assert!(error.to_string().contains("only apply to --edit-user"));

        let error = parse_cli_args(vec!["--edit-user", "auth0|1"], default_options_path())
            .expect_err("edit without fields should fail");
        assert!(error.to_string().contains("at least one of"));

        let error = parse_cli_args(
            vec!["--edit-user", "auth0|1", "--full-name"],
            default_options_path(),
        )
        .expect_err("missing value should fail");
        assert!(error.to_string().contains("--full-name requires a value"));
    }

    #[test]
    fn parse_cli_args_requires_values() {
        let error = parse_cli_args(vec!["--show-user"], default_options_path())
            .expect_err("missing id should fail");
        assert!(error.to_string().contains("--show-user requires a user id"));

        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing path should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_rejects_two_commands() {
        let error = parse_cli_args(vec!["--whoami", "--list-users"], default_options_path())
            .expect_err("two commands should fail");
        assert!(error.to_string().contains("cannot be combined"));
    }

    #[test]
    fn parse_cli_args_rejects_unknown_flags() {
        let error = parse_cli_args(vec!["--orders"], default_options_path())
            .expect_err("unknown flag should fail");
        assert!(error.to_string().contains("--help"));
    }

    #[test]
    fn whoami_lists_the_sections_the_role_can_open() -> Result<()> {
        let backend = DemoBackend::new();
        backend.sign_in_as(&UserId::new("auth0|employee-1"));
        let profile = backend.current_profile()?;
        let role = authorize(&profile)?;

        let text = describe_profile(&profile, role);
        assert!(text.contains("role: employee"));
        assert!(text.contains("Create order"));
        assert!(!text.contains("Users"));
        Ok(())
    }

    #[test]
    fn user_commands_require_admin() {
        let backend = DemoBackend::new();
        let error = run_user_command(&backend, Role::Employee, &UserCommand::List)
            .expect_err("employees cannot list users");
        let message = error.to_string();
        assert!(message.contains("admin"), "{message}");
        assert!(message.contains("signed in as employee"), "{message}");
    }

    #[test]
    fn admin_can_list_and_edit_users() -> Result<()> {
        let backend = DemoBackend::new();
        let table = run_user_command(&backend, Role::Admin, &UserCommand::List)?;
        assert!(table.contains("auth0|employee-1"));
        assert!(table.contains("auth0|pending-1"));

        let id = UserId::new("auth0|pending-1");
        let message = run_user_command(
            &backend,
            Role::Admin,
            &UserCommand::Edit {
                id: id.clone(),
                edit: UserEdit {
                    code_erp: Some("CLI-301".to_owned()),
                    ..UserEdit::default()
                },
            },
        )?;
        assert!(message.contains("erp code: CLI-301"), "{message}");

        let stored = backend.get_user(&id)?;
        assert_eq!(stored.code_erp, "CLI-301");
        assert_eq!(stored.full_name, "Nuevo Usuario");
        assert!(!stored.is_active);
        Ok(())
    }

    #[test]
    fn pending_profile_is_reported_as_incomplete() -> Result<()> {
        let backend = DemoBackend::new();
        backend.sign_in_as(&UserId::new("auth0|pending-1"));
        let error = authorize(&backend.current_profile()?).expect_err("pending profile");
        assert!(error.is::<IncompleteProfile>());
        assert!(error.to_string().contains("missing code_erp"));
        Ok(())
    }
}
