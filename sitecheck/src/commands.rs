use clap::{ArgAction, arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitecheck")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitecheck")
        .arg(
            arg!(-v --verbose "Log more; repeat for debug output")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about("Spider one or more hosts and print a status map of every URL found")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to start from")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-c --"max-connections" <N>)
                        .required(false)
                        .help("Number of simultaneous connections to the remote server(s)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("6"),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Seconds to wait for each response")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("15"),
                )
                .arg(
                    arg!(--"follow-offsite-redirects" "Follow redirects that leave the seed hosts")
                        .required(false),
                ),
        )
        .subcommand(
            command!("check")
                .about("Spider a site looking for problems and produce a QA report")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to start from")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-c --"max-connections" <N>)
                        .required(false)
                        .help("Number of simultaneous connections to the remote server(s)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("6"),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Seconds to wait for each response")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("15"),
                )
                .arg(arg!(--"skip-media" "Skip media files: <img>, <object>, etc.").required(false))
                .arg(
                    arg!(--"skip-resources" "Skip page resources: <script>, <link>")
                        .required(false),
                )
                .arg(
                    arg!(--"skip-link-re" <PATTERN>)
                        .required(false)
                        .help("Never follow links whose URL path matches this regular expression"),
                )
                .arg(
                    arg!(--"follow-offsite-redirects" "Follow redirects that leave the seed hosts")
                        .required(false),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, html or json")
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <FILE>)
                        .required(false)
                        .help("Save the report to a file instead of stdout"),
                ),
        )
}
