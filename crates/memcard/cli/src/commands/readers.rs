use memcard_apdu_transport_pcsc::PcscContext;

use crate::utils::display;

/// List all available readers
pub fn list_readers() -> Result<(), Box<dyn std::error::Error>> {
    let context = PcscContext::establish()?;
    let readers = context.readers()?;

    if readers.is_empty() {
        println!("{}", display::warning("No readers found!"));
        return Ok(());
    }

    println!("{}", display::section_title("Available readers"));
    for (i, reader) in readers.iter().enumerate() {
        let status = match reader.atr() {
            Some(atr) => format!("card present, ATR {}", hex::encode_upper(atr)),
            None => "no card".to_string(),
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    // The session only ever drives the first reader
    if readers.len() > 1 {
        println!("{}", display::info("Only the first reader is used by the session"));
    }

    Ok(())
}
