use colored::Colorize;

use typeform::cli::CommandLineInterface;

fn main() {
    let command_line_interface = CommandLineInterface::load();
    typeform::init_tracing(command_line_interface.verbose);
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error}", "error:".red().bold());
        for cause in error.chain().skip(1) {
            eprintln!("  {} {cause}", "caused by:".red());
        }
        std::process::exit(1);
    }
}
