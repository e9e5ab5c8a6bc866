//! Voice-directive XML generation.
//!
//! Every webhook response is a small TwiML-style document telling the
//! gateway what to speak and where to post the next event. Generated with
//! `quick-xml`'s writer API.

use std::io::Cursor;

use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::error::Error;

const GATHER_TIMEOUT_SECS: &str = "5";
const VOICE: &str = "Polly.Joanna";

/// A speak-then-listen turn. `action` receives the captured speech;
/// `fallback` receives control when the gather captures nothing.
pub struct GatherPrompt<'a> {
  pub text:     &'a str,
  pub action:   &'a str,
  pub fallback: &'a str,
}

/// `<Response><Gather …><Say>text</Say></Gather><Redirect>fallback</Redirect></Response>`
pub fn speak_and_gather(prompt: &GatherPrompt<'_>) -> Result<String, Error> {
  build(|writer| {
    let mut gather = BytesStart::new("Gather");
    gather.push_attribute(("input", "speech"));
    gather.push_attribute(("action", prompt.action));
    gather.push_attribute(("method", "POST"));
    gather.push_attribute(("timeout", GATHER_TIMEOUT_SECS));
    gather.push_attribute(("speechTimeout", "auto"));
    gather.push_attribute(("speechModel", "phone_call"));
    writer.write_event(Event::Start(gather))?;
    say(writer, prompt.text)?;
    writer.write_event(Event::End(BytesEnd::new("Gather")))?;

    // No speech captured within the timeout: fall through to the
    // no-response endpoint.
    let mut redirect = BytesStart::new("Redirect");
    redirect.push_attribute(("method", "POST"));
    writer.write_event(Event::Start(redirect))?;
    writer.write_event(Event::Text(BytesText::new(prompt.fallback)))?;
    writer.write_event(Event::End(BytesEnd::new("Redirect")))?;
    Ok(())
  })
}

/// `<Response><Say>text</Say><Hangup/></Response>`
pub fn speak_and_hangup(text: &str) -> Result<String, Error> {
  build(|writer| {
    say(writer, text)?;
    writer.write_event(Event::Empty(BytesStart::new("Hangup")))?;
    Ok(())
  })
}

/// `<Response/>` — acknowledged, nothing to speak.
pub fn empty_response() -> Result<String, Error> {
  let mut writer = Writer::new(Cursor::new(Vec::new()));
  writer
    .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    .map_err(|e| Error::Xml(e.to_string()))?;
  writer
    .write_event(Event::Empty(BytesStart::new("Response")))
    .map_err(|e| Error::Xml(e.to_string()))?;
  finish(writer)
}

fn say(
  writer: &mut Writer<Cursor<Vec<u8>>>,
  text: &str,
) -> Result<(), quick_xml::Error> {
  let mut say = BytesStart::new("Say");
  say.push_attribute(("voice", VOICE));
  writer.write_event(Event::Start(say))?;
  writer.write_event(Event::Text(BytesText::new(text)))?;
  writer.write_event(Event::End(BytesEnd::new("Say")))?;
  Ok(())
}

fn build(
  body: impl FnOnce(&mut Writer<Cursor<Vec<u8>>>) -> Result<(), quick_xml::Error>,
) -> Result<String, Error> {
  let mut writer = Writer::new(Cursor::new(Vec::new()));
  let result: Result<(), quick_xml::Error> = (|| {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("Response")))?;
    body(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new("Response")))?;
    Ok(())
  })();
  result.map_err(|e| Error::Xml(e.to_string()))?;
  finish(writer)
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, Error> {
  String::from_utf8(writer.into_inner().into_inner())
    .map_err(|e| Error::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gather_document_shape() {
    let xml = speak_and_gather(&GatherPrompt {
      text:     "What is your budget?",
      action:   "/webhooks/gather/abc?question_key=budget",
      fallback: "/webhooks/fallback/abc?question_key=budget",
    })
    .unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<Gather input=\"speech\""));
    assert!(xml.contains("action=\"/webhooks/gather/abc?question_key=budget\""));
    assert!(xml.contains("<Say voice=\"Polly.Joanna\">What is your budget?</Say>"));
    assert!(xml.contains("<Redirect method=\"POST\">"));
    assert!(xml.ends_with("</Response>"));
  }

  #[test]
  fn hangup_document_shape() {
    let xml = speak_and_hangup("Goodbye.").unwrap();
    assert!(xml.contains("<Say voice=\"Polly.Joanna\">Goodbye.</Say>"));
    assert!(xml.contains("<Hangup/>"));
  }

  #[test]
  fn text_is_escaped() {
    let xml = speak_and_hangup("Fish & chips <now>").unwrap();
    assert!(xml.contains("Fish &amp; chips &lt;now&gt;"));
  }

  #[test]
  fn empty_response_is_a_bare_element() {
    let xml = empty_response().unwrap();
    assert!(xml.ends_with("<Response/>"));
  }
}
