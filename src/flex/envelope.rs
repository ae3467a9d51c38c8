//! Flex Web Service response classification.
//!
//! The service reuses the same `Status` element with different sibling fields in both protocol
//! phases and returns structurally different roots on success, so all decisions about which
//! response shape we've got are made here.

use log::{debug, warn};

use crate::formats::xml::Node;

use super::error::FlexError;

pub const RESPONSE_ROOT: &str = "FlexStatementResponse";
pub const REPORT_ROOT: &str = "FlexQueryResponse";
pub const STATEMENTS_KEY: &str = "FlexStatements";

const STATUS_SUCCESS: &str = "Success";
const STATUS_FAIL: &str = "Fail";

// 1019: Statement generation in progress. Please try again shortly.
// 1021: Statement could not be retrieved at this time. Please try again shortly.
const STATEMENT_NOT_READY_CODES: &[&str] = &["1019", "1021"];

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    InitialAck {
        reference_code: String,
    },
    InitialFailure {
        error_code: Option<String>,
        error_message: String,
    },
    PollPending,
    PollFailure {
        error_code: String,
        error_message: String,
    },
    PollSuccess {
        statement_root: Node,
    },
}

/// Classifies response to the statement generation request.
pub fn classify_submit(document: &Node) -> Result<Envelope, FlexError> {
    let root = document.node(RESPONSE_ROOT).unwrap_or(document);

    if root.text("Status").as_deref() == Some(STATUS_FAIL) {
        return Ok(Envelope::InitialFailure {
            error_code: root.non_empty_text("ErrorCode").map(|code| code.into_owned()),
            error_message: error_message(root),
        });
    }

    match root.non_empty_text("ReferenceCode") {
        Some(reference_code) => Ok(Envelope::InitialAck {
            reference_code: reference_code.trim().to_owned(),
        }),
        None => Err(FlexError::ProtocolViolation(s!(
            "no reference code has been returned for the statement request"))),
    }
}

/// Classifies response to the statement pickup request.
pub fn classify_poll(document: &Node) -> Envelope {
    // The report may be returned inline without any status wrapping
    if let Some(report) = document.node(REPORT_ROOT) {
        return Envelope::PollSuccess {
            statement_root: report.clone(),
        };
    }

    let root = document.node(RESPONSE_ROOT).unwrap_or(document);

    match root.text("Status").as_deref() {
        Some(STATUS_SUCCESS) => {
            if root.contains(STATEMENTS_KEY) {
                return Envelope::PollSuccess {
                    statement_root: root.clone(),
                };
            }
            warn!("Got a successful pickup response without statements.");
        },

        Some(STATUS_FAIL) => {
            let error_code = root.non_empty_text("ErrorCode")
                .map(|code| code.trim().to_owned()).unwrap_or_default();
            let error_message = error_message(root);

            if STATEMENT_NOT_READY_CODES.contains(&error_code.as_str()) {
                debug!("The statement is not ready yet: {error_message} ({error_code}).");
                return Envelope::PollPending;
            }

            return Envelope::PollFailure {error_code, error_message};
        },

        status => {
            warn!("Got an unexpected pickup response (status: {status:?}).");
        },
    }

    Envelope::PollPending
}

fn error_message(root: &Node) -> String {
    root.non_empty_text("ErrorMessage").map(|message| message.trim().to_owned())
        .unwrap_or_else(|| s!("Unknown error"))
}

#[cfg(test)]
mod tests {
    use indoc::{indoc, formatdoc};
    use crate::formats::xml;
    use super::*;

    fn submit(response: &str) -> Result<Envelope, FlexError> {
        classify_submit(&xml::decode(response).unwrap())
    }

    fn poll(response: &str) -> Envelope {
        classify_poll(&xml::decode(response).unwrap())
    }

    #[test]
    fn submit_success() {
        let envelope = submit(indoc!("
            <FlexStatementResponse timestamp='15 January, 2024 10:00 AM EST'>
                <Status>Success</Status>
                <ReferenceCode>0123456789</ReferenceCode>
                <Url>https://gdcdyn.interactivebrokers.com/Universal/servlet/FlexStatementService.GetStatement</Url>
            </FlexStatementResponse>
        ")).unwrap();

        assert_eq!(envelope, Envelope::InitialAck {reference_code: s!("0123456789")});
    }

    #[test]
    fn submit_failure() {
        let envelope = submit(indoc!("
            <FlexStatementResponse timestamp='15 January, 2024 10:00 AM EST'>
                <Status>Fail</Status>
                <ErrorCode>1012</ErrorCode>
                <ErrorMessage>Token has expired.</ErrorMessage>
            </FlexStatementResponse>
        ")).unwrap();

        assert_eq!(envelope, Envelope::InitialFailure {
            error_code: Some(s!("1012")),
            error_message: s!("Token has expired."),
        });
    }

    #[test]
    fn submit_without_reference_code() {
        let error = submit(indoc!("
            <FlexStatementResponse>
                <Status>Success</Status>
            </FlexStatementResponse>
        ")).unwrap_err();
        assert!(matches!(error, FlexError::ProtocolViolation(_)));

        let error = submit("<Other/>").unwrap_err();
        assert!(matches!(error, FlexError::ProtocolViolation(_)));
    }

    #[test]
    fn poll_inline_report() {
        let envelope = poll(indoc!(r#"
            <FlexQueryResponse queryName="Positions" type="AF">
                <FlexStatements count="1">
                    <FlexStatement accountId="U1234567"/>
                </FlexStatements>
            </FlexQueryResponse>
        "#));

        match envelope {
            Envelope::PollSuccess {statement_root} => {
                assert_eq!(statement_root.text("queryName").unwrap(), "Positions");
                assert!(statement_root.contains(STATEMENTS_KEY));
            },
            _ => panic!("Unexpected envelope: {envelope:?}"),
        }
    }

    #[test]
    fn poll_wrapped_report() {
        let envelope = poll(indoc!(r#"
            <FlexStatementResponse>
                <Status>Success</Status>
                <FlexStatements count="1">
                    <FlexStatement accountId="U1234567"/>
                </FlexStatements>
            </FlexStatementResponse>
        "#));

        match envelope {
            Envelope::PollSuccess {statement_root} => assert!(statement_root.contains(STATEMENTS_KEY)),
            _ => panic!("Unexpected envelope: {envelope:?}"),
        }
    }

    #[test]
    fn poll_not_ready() {
        for code in ["1019", "1021"] {
            let envelope = poll(&formatdoc!("
                <FlexStatementResponse>
                    <Status>Fail</Status>
                    <ErrorCode>{code}</ErrorCode>
                    <ErrorMessage>Statement generation in progress. Please try again shortly.</ErrorMessage>
                </FlexStatementResponse>
            "));
            assert_eq!(envelope, Envelope::PollPending);
        }
    }

    #[test]
    fn poll_failure() {
        let envelope = poll(indoc!("
            <FlexStatementResponse>
                <Status>Fail</Status>
                <ErrorCode>1015</ErrorCode>
                <ErrorMessage>Token is invalid.</ErrorMessage>
            </FlexStatementResponse>
        "));

        assert_eq!(envelope, Envelope::PollFailure {
            error_code: s!("1015"),
            error_message: s!("Token is invalid."),
        });
    }

    #[test]
    fn poll_ambiguous() {
        assert_eq!(poll("<FlexStatementResponse/>"), Envelope::PollPending);
        assert_eq!(poll("<Something><Else/></Something>"), Envelope::PollPending);
        assert_eq!(poll(indoc!("
            <FlexStatementResponse>
                <Status>Success</Status>
            </FlexStatementResponse>
        ")), Envelope::PollPending);
    }
}
