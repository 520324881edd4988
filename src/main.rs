use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    nestchat::cli::main()
}
