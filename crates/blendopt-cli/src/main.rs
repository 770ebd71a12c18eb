use blendopt_core::{BlendPolicy, BlendReport, BlendRequest, GradeOutcome, SolverChoice};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "blendopt")]
#[command(about = "Multi-grade blend optimization with infeasibility diagnosis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a JSON blend request and print the report
    Solve {
        /// The request file
        file: PathBuf,
        /// Override the solver named in the request (simplex, microlp)
        #[arg(short, long)]
        solver: Option<SolverChoice>,
        /// JSON policy file; defaults apply when omitted
        #[arg(short, long)]
        policy: Option<PathBuf>,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
        /// Print a readable summary instead of JSON
        #[arg(long, conflicts_with = "compact")]
        summary: bool,
    },
    /// Validate a request file without solving it
    Check {
        /// The request file
        file: PathBuf,
    },
    /// Print the built-in refinery request as JSON
    Sample,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            file,
            solver,
            policy,
            compact,
            summary,
        } => {
            let mut request: BlendRequest = read_json(&file);
            if let Some(solver) = solver {
                request = request.with_solver(solver);
            }
            let policy = match policy {
                Some(path) => read_json(&path),
                None => BlendPolicy::default(),
            };

            let report = match blendopt_core::optimize(&request, &policy) {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("Input error: {}", e);
                    std::process::exit(1);
                }
            };

            if summary {
                print_summary(&report);
            } else {
                let json = if compact {
                    serde_json::to_string(&report)
                } else {
                    serde_json::to_string_pretty(&report)
                };
                match json {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error writing report: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::Check { file } => {
            let request: BlendRequest = read_json(&file);
            match request.prepare() {
                Ok(_) => {
                    println!("✓ {} is valid", file.display());
                    println!("  {} grades", request.grades.len());
                    println!("  {} components", request.components.len());
                    println!("  {} specifications", request.specs.len());
                    println!("  solver: {}", request.solver.as_str());
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Sample => match serde_json::to_string_pretty(&blendopt_core::sample::refinery_request()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error writing sample: {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&source) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Parse error in {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn print_summary(report: &BlendReport) {
    println!("Status: {}", report.status.as_str().to_uppercase());
    println!("Solver: {}", report.solver_used);
    if let Some(objective) = report.objective_value {
        println!("Total profit: {:.2}", objective);
    }

    for grade in &report.grades {
        println!();
        println!("Grade: {}", grade.grade);
        match &grade.outcome {
            GradeOutcome::Optimal(blend) => {
                println!(
                    "  Volume {:.2}  Revenue {:.2}  Cost {:.2}  Profit {:.2}",
                    blend.total_volume, blend.total_revenue, blend.total_cost, blend.profit
                );
                for (component, amount) in &blend.blend {
                    if *amount > 0.001 {
                        let pct = amount / blend.total_volume * 100.0;
                        println!("  {:20} {:12.2} ({:5.2}%)", component, amount, pct);
                    }
                }
                for (property, value) in &blend.quality {
                    println!("  {:20} {:12.4}", property.name(), value);
                }
            }
            GradeOutcome::Infeasible { solver_status, diagnosis } => {
                println!("  Status: {}", solver_status.as_str().to_uppercase());
                for line in &diagnosis.narrative {
                    println!("  {}", line);
                }
                if let Some(best) = &diagnosis.best_effort {
                    println!(
                        "  Best effort ({:?}), profit if constraints ignored: {:.2}",
                        best.method, best.profit_if_ignored
                    );
                    for v in &best.violations {
                        println!(
                            "    {} {} required {:.4} achieved {:.4}{}",
                            v.property.name(),
                            v.side,
                            v.required,
                            v.achieved,
                            if v.hard { " (hard)" } else { "" }
                        );
                    }
                }
            }
        }
    }

    if let Some(analysis) = &report.sensitivity {
        if !analysis.binding_constraints.is_empty() {
            println!();
            println!("Binding constraints:");
            for name in &analysis.binding_constraints {
                println!("  - {}", name);
            }
        }
        println!();
        println!("Shadow prices:");
        for sp in &analysis.shadow_prices {
            if sp.value.abs() > 0.001 {
                println!("  {:30} {:10.4}", sp.constraint, sp.value);
            }
        }
    }

    println!();
    println!("Component usage:");
    for usage in &report.component_usage {
        println!("  {:20} {:12.2} of {:12.2}", usage.label, usage.used, usage.availability);
    }
}
