// SCXML tags
pub const TAG_SCXML: &str = "scxml";
pub const TAG_STATE: &str = "state";
pub const TAG_PARALLEL: &str = "parallel";
pub const TAG_FINAL: &str = "final";
pub const TAG_HISTORY: &str = "history";
pub const TAG_INITIAL: &str = "initial";
pub const TAG_TRANSITION: &str = "transition";
pub const TAG_ONENTRY: &str = "onentry";
pub const TAG_ONEXIT: &str = "onexit";
pub const TAG_DATAMODEL: &str = "datamodel";
pub const TAG_DATA: &str = "data";
pub const TAG_INVOKE: &str = "invoke";
pub const TAG_FINALIZE: &str = "finalize";
pub const TAG_DONEDATA: &str = "donedata";
pub const TAG_CONTENT: &str = "content";
pub const TAG_PARAM: &str = "param";
pub const TAG_SCRIPT: &str = "script";
pub const TAG_RAISE: &str = "raise";
pub const TAG_IF: &str = "if";
pub const TAG_ELSEIF: &str = "elseif";
pub const TAG_ELSE: &str = "else";
pub const TAG_FOREACH: &str = "foreach";
pub const TAG_LOG: &str = "log";
pub const TAG_ASSIGN: &str = "assign";
pub const TAG_VAR: &str = "var";
pub const TAG_SEND: &str = "send";
pub const TAG_CANCEL: &str = "cancel";

// Pseudo-tags naming non-element content in errors
pub const TAG_DOCUMENT: &str = "#document";
pub const TAG_TEXT: &str = "#text";
pub const TAG_CDATA: &str = "#cdata";

// SCXML attributes
pub const ATTR_ID: &str = "id";
pub const ATTR_NAME: &str = "name";
pub const ATTR_VERSION: &str = "version";
pub const ATTR_INITIAL: &str = "initial";
pub const ATTR_DATAMODEL: &str = "datamodel";
pub const ATTR_BINDING: &str = "binding";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_TYPEEXPR: &str = "typeexpr";
pub const ATTR_EVENT: &str = "event";
pub const ATTR_EVENTEXPR: &str = "eventexpr";
pub const ATTR_COND: &str = "cond";
pub const ATTR_TARGET: &str = "target";
pub const ATTR_TARGETEXPR: &str = "targetexpr";
pub const ATTR_SRC: &str = "src";
pub const ATTR_SRCEXPR: &str = "srcexpr";
pub const ATTR_EXPR: &str = "expr";
pub const ATTR_LOCATION: &str = "location";
pub const ATTR_LABEL: &str = "label";
pub const ATTR_ARRAY: &str = "array";
pub const ATTR_ITEM: &str = "item";
pub const ATTR_INDEX: &str = "index";
pub const ATTR_IDLOCATION: &str = "idlocation";
pub const ATTR_SENDID: &str = "sendid";
pub const ATTR_SENDIDEXPR: &str = "sendidexpr";
pub const ATTR_DELAY: &str = "delay";
pub const ATTR_DELAYEXPR: &str = "delayexpr";
pub const ATTR_NAMELIST: &str = "namelist";
pub const ATTR_HINTS: &str = "hints";
pub const ATTR_AUTOFORWARD: &str = "autoforward";

// Attribute values
pub const VAL_EARLY: &str = "early";
pub const VAL_LATE: &str = "late";
pub const VAL_INTERNAL: &str = "internal";
pub const VAL_EXTERNAL: &str = "external";
pub const VAL_SHALLOW: &str = "shallow";
pub const VAL_DEEP: &str = "deep";
pub const VAL_TRUE: &str = "true";
pub const VAL_FALSE: &str = "false";
