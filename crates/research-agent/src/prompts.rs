//! Instruction templates for the planner, specialists and reflection

use research_core::{AgentRole, PromptTemplate};

pub const PLAN: PromptTemplate = PromptTemplate::new(
    "plan",
    "You are the lead analyst planning investment research on {{ topic }}.\n\n\
     Break the research into objectives and concrete steps. Every step must name \
     exactly one data source:\n\
     - yahoo_finance: prices, volume and market activity\n\
     - alpha_vantage: company overview and financial ratios\n\
     - fred: macroeconomic indicators\n\
     - sec_edgar: regulatory filings\n\
     {% if history %}\n\
     Lessons from previous research on this topic:\n\
     {% for run in history %}- run scored {{ run.score }}: {{ run.insights | join(\"; \") }}\n{% endfor %}\
     {% endif %}",
);

pub const SPECIALIST: PromptTemplate = PromptTemplate::new(
    "specialist",
    "You are the {{ role }} specialist on an investment research team.\n\
     {{ instructions }}\n\n\
     Topic: {{ topic }}\n\
     {% if objectives %}Research objectives:\n{{ objectives | bullets }}\n{% endif %}\n\
     Data from {{ source }}:\n\
     {{ data }}\n\n\
     Base every finding on the data above and state your confidence from 0.0 to 1.0.",
);

pub const REFLECTION: PromptTemplate = PromptTemplate::new(
    "reflection",
    "Review the research run on {{ topic }} and score its overall quality from \
     0.0 to 1.0 for coverage, rigor and usefulness.\n\n\
     Objectives:\n{{ objectives | bullets }}\n\n\
     Specialist analyses:\n\
     {% for a in analyses %}- {{ a.role }} ({{ a.status }}): {{ a.summary }}\n{% endfor %}\n\
     Workflow outputs:\n\
     {% for w in workflows %}- {{ w.pattern }}: {{ w.artifact }}\n{% endfor %}\
     {% if history %}\n\
     Previous runs on this topic scored: {{ history | join(\", \") }}\n\
     {% endif %}\n\
     List strengths, weaknesses and improvements for future runs.",
);

/// Role-specific focus for the specialist template
pub fn role_instructions(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Market => {
            "Analyze recent price action, trading ranges, volume and momentum. \
             Flag unusual moves relative to the period high and low."
        }
        AgentRole::Fundamentals => {
            "Assess valuation, profitability and growth from the company overview. \
             Compare ratios such as P/E, margins and return on equity to typical ranges."
        }
        AgentRole::EconomicContext => {
            "Describe the macroeconomic backdrop from rates, the yield curve, inflation \
             and employment, and explain how it affects the company."
        }
        AgentRole::Regulatory => {
            "Review recent SEC filings for reporting cadence and material events, \
             and highlight anything that warrants follow-up."
        }
    }
}
