use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::{get_config_path, save_config, Config, EditingConfig};
use crate::grading::{
    validate_config, CatalogGroup, CatalogModule, CreditRule, GroupCatalog, MatchingConfig,
    NamePattern, PassingConfig, MAX_CREDITS, MAX_SCORE, MIN_CREDITS, MIN_SCORE,
};

/// Prompt user with a message and return their trimmed input.
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().to_string())
}

/// Prompt user with a message and a default value. Returns default if input is empty.
fn prompt_with_default(message: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}]: ", message, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

/// Prompt user with a yes/no question. Returns bool based on input and default.
fn prompt_yes_no(message: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    let input = prompt(&format!("{} [{}]: ", message, hint))?.to_lowercase();
    if input.is_empty() {
        Ok(default_yes)
    } else {
        Ok(matches!(input.as_str(), "y" | "yes" | "o" | "oui"))
    }
}

/// Print text with a typewriter effect, one character at a time.
fn typewriter(text: &str) {
    use std::thread;
    use std::time::Duration;
    for c in text.chars() {
        print!("{}", c);
        std::io::stdout().flush().ok();
        thread::sleep(Duration::from_millis(12));
    }
    println!();
}

/// A mark on the 0-20 scale. Accepts a comma as decimal separator.
fn parse_mark(input: &str) -> Result<f64, String> {
    let value: f64 = input
        .trim()
        .replacen(',', ".", 1)
        .parse()
        .map_err(|_| format!("'{}' is not a number", input))?;
    if (MIN_SCORE..=MAX_SCORE).contains(&value) {
        Ok(value)
    } else {
        Err(format!("must be between {} and {}", MIN_SCORE, MAX_SCORE))
    }
}

fn parse_credits(input: &str) -> Result<u32, String> {
    match input.trim().parse::<u32>() {
        Ok(n) if (MIN_CREDITS..=MAX_CREDITS).contains(&n) => Ok(n),
        _ => Err(format!("must be a whole number between {} and {}", MIN_CREDITS, MAX_CREDITS)),
    }
}

fn parse_threshold(input: &str) -> Result<f64, String> {
    match input.trim().replacen(',', ".", 1).parse::<f64>() {
        Ok(t) if t > 0.0 && t <= 1.0 => Ok(t),
        _ => Err("must be a number in (0, 1]".to_string()),
    }
}

/// Comma-separated aliases; blank parts are dropped.
fn parse_aliases(input: &str) -> Option<Vec<String>> {
    let aliases: Vec<String> = input
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if aliases.is_empty() {
        None
    } else {
        Some(aliases)
    }
}

/// Ask until `parse` accepts the answer.
fn prompt_parsed<T>(message: &str, default: &str, parse: impl Fn(&str) -> Result<T, String>) -> Result<T> {
    loop {
        let input = prompt_with_default(message, default)?;
        match parse(&input) {
            Ok(value) => return Ok(value),
            Err(e) => println!("  Invalid: {}. Try again.", e),
        }
    }
}

fn prompt_required(message: &str) -> Result<String> {
    loop {
        let input = prompt(message)?;
        if !input.is_empty() {
            return Ok(input);
        }
        println!("  A value is required.");
    }
}

fn prompt_passing() -> Result<PassingConfig> {
    let defaults = PassingConfig::default();
    typewriter("A module is validated when its average reaches the module mark.");
    typewriter("Integration projects (\"Projet d'Intégration\", \"PI\") need the strict mark instead.");
    let module = prompt_parsed("Module pass mark", &defaults.module.to_string(), parse_mark)?;
    let strict = prompt_parsed("Strict pass mark", &defaults.strict.to_string(), parse_mark)?;
    let overall = prompt_parsed("Overall pass mark", &defaults.overall.to_string(), parse_mark)?;
    Ok(PassingConfig {
        module,
        strict,
        overall,
        ..defaults
    })
}

fn prompt_module() -> Result<CatalogModule> {
    let name = prompt_required("    Module name (as it appears in the grades table): ")?;
    let credits = prompt_parsed("    Credits", "1", parse_credits)?;
    let aliases = parse_aliases(&prompt("    Other spellings, comma-separated (optional): ")?);
    Ok(CatalogModule {
        name,
        credits,
        aliases,
    })
}

fn prompt_catalog() -> Result<GroupCatalog> {
    typewriter("UEs group modules together. Their average is weighted by each module's credits.");
    typewriter("Without any UE, every module is its own UE with the credits found in the credit rules (or 1).");
    let mut groups: Vec<CatalogGroup> = Vec::new();
    let mut add_group = prompt_yes_no("Define a UE?", false)?;
    while add_group {
        let name = loop {
            let n = prompt_required("  UE name: ")?;
            if groups.iter().any(|g| g.name == n) {
                println!("  A UE named '{}' already exists.", n);
                continue;
            }
            break n;
        };
        let mut modules = vec![prompt_module()?];
        while prompt_yes_no("    Add another module to this UE?", true)? {
            modules.push(prompt_module()?);
        }
        groups.push(CatalogGroup { name, modules });
        add_group = prompt_yes_no("Define another UE?", false)?;
    }
    Ok(GroupCatalog::new(groups))
}

fn prompt_credit_rules() -> Result<Vec<CreditRule>> {
    typewriter("Credit rules give fixed credits to modules whose name contains a keyword.");
    typewriter("Examples: 'anglais' -> 1, 'projet & intégration' -> 5, '=pi' (exact name) -> 5.");
    let mut rules = Vec::new();
    let mut add_rule = prompt_yes_no("Add a credit rule?", false)?;
    while add_rule {
        let pattern = NamePattern::from(prompt_required("  Keyword: ")?);
        let credits = prompt_parsed("  Credits", "1", parse_credits)?;
        rules.push(CreditRule { pattern, credits });
        add_rule = prompt_yes_no("  Add another credit rule?", false)?;
    }
    Ok(rules)
}

/// Run the interactive init wizard to create a config file.
///
/// If `default_path` is Some, uses that as the config file path.
/// Otherwise, prompts the user with the default config path.
pub fn run_init_wizard(default_path: Option<PathBuf>) -> Result<()> {
    println!();
    typewriter("UE Calc Configuration Wizard");
    println!("============================");
    println!();

    // 1. Pass marks
    let passing = if prompt_yes_no("Configure pass marks? (n accepts 8 / 10 / 10)", false)? {
        println!();
        prompt_passing()?
    } else {
        PassingConfig::default()
    };

    // 2. Matching and editing
    println!();
    typewriter("Module names in the grades table rarely match the official names exactly.");
    typewriter("The similarity threshold decides how close two names must be (1 = identical).");
    let similarity_threshold = prompt_parsed("Similarity threshold", "0.7", parse_threshold)?;

    println!();
    typewriter("While editing, averages are recalculated once you stop typing for a moment.");
    let debounce = prompt_parsed("Recalculation delay", "500ms", |s| {
        humantime::parse_duration(s)
            .map(|_| s.to_string())
            .map_err(|e| e.to_string())
    })?;

    // 3. Catalog and credit rules
    println!();
    let catalog = prompt_catalog()?;
    println!();
    let credit_rules = prompt_credit_rules()?;

    let config = Config {
        catalog,
        credit_rules,
        matching: MatchingConfig {
            similarity_threshold,
        },
        passing,
        editing: EditingConfig { debounce },
    };

    if let Err(errors) = validate_config(&config) {
        println!();
        println!("The configuration is not valid:");
        for error in errors {
            println!("  - {}", error);
        }
        println!("Aborted.");
        return Ok(());
    }

    // 4. Config path
    let default_config_path = match default_path {
        Some(path) => path,
        None => get_config_path()?,
    };
    println!();
    let path_str = prompt_with_default(
        "Where should the config be saved?",
        &default_config_path.display().to_string(),
    )?;
    let config_path = PathBuf::from(&path_str);

    if config_path.exists() {
        let overwrite = prompt_yes_no(
            &format!("Config already exists at {}. Overwrite?", config_path.display()),
            false,
        )?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    // 5. Write config
    save_config(&config_path, &config)?;

    println!();
    println!("Config written to {}", config_path.display());
    typewriter("UE layouts changed in the editor (m to merge, s to split) can be saved back with w.");
    println!("Run `ue-calc show <grades.csv>` to get started.");

    Ok(())
}
