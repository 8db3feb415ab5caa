//! Common test utilities

use memcard_apdu_transport_pcsc::{PcscContext, ReaderContext};

/// Try to get a real PC/SC context for tests
pub fn get_pcsc_context() -> Option<PcscContext> {
    PcscContext::establish().ok()
}

/// Try to get a real reader with a card for tests
pub fn get_reader_with_card(context: &PcscContext) -> Option<String> {
    let readers = context.readers().ok()?;
    readers
        .into_iter()
        .find(|reader| reader.has_card())
        .map(|reader| reader.name().to_string())
}

/// Try to get the first attached reader
pub fn get_first_reader(context: &PcscContext) -> Option<String> {
    context.list_readers().ok()?.into_iter().next()
}
