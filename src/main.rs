use std::env;
use std::process::ExitCode;

use pyhsmm::config::{self, Config};
use pyhsmm::{self, LmReport, WsReport};

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cfg = match Config::new(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            config::print_usage();
            return ExitCode::FAILURE;
        }
    };

    let result = match cfg.command {
        config::Command::Lm => pyhsmm::run_lm(&cfg).map(Output::Lm),
        config::Command::Ws => pyhsmm::run_ws(&cfg).map(Output::Ws),
        config::Command::WsTest => pyhsmm::run_ws_test(&cfg).map(Output::Ws),
    };

    match result {
        Ok(output) => {
            print_output(&output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

enum Output {
    Lm(LmReport),
    Ws(WsReport),
}

fn print_output(output: &Output) {
    match output {
        Output::Lm(report) => {
            println!("trained {} epoch(s)", report.epochs_trained);
            if let Some(ppl) = report.test_perplexity {
                println!("test perplexity: {ppl:.4}");
            }
        }
        Output::Ws(report) => {
            println!("trained {} epoch(s)", report.epochs_trained);
            match (&report.decoded, &report.decoded_tags) {
                (Some(words), Some(tags)) => {
                    for (sent, sent_tags) in words.iter().zip(tags.iter()) {
                        let line: Vec<String> = sent
                            .iter()
                            .zip(sent_tags.iter())
                            .map(|(w, t)| format!("{w}/{t}"))
                            .collect();
                        println!("{}", line.join(" "));
                    }
                }
                (Some(words), None) => {
                    for sent in words {
                        println!("{}", sent.join(" "));
                    }
                }
                _ => {}
            }
        }
    }
}
