//! Default sequence copy: a generic message per step plus industry-specific
//! openers for the initial email.

use super::TemplateDescriptor;

struct IndustryCopy {
    key: &'static str,
    subject: &'static str,
    opening: &'static str,
    pain: &'static str,
    question: &'static str,
    solution: &'static str,
    example: &'static str,
}

const INDUSTRIES: [IndustryCopy; 8] = [
    IndustryCopy {
        key: "construction",
        subject: "How much can you bid on that new job?",
        opening: "You've got a bid request. You need to decide what you can afford to commit to.",
        pain: "Material costs are up. Labor's tight. Three jobs are running and two more start next month.",
        question: "Can you take this job without stretching cash too thin?",
        solution: "Real-time cash flow by job shows exactly what you can bid without putting the business at risk.",
        example: "One general contractor found $85K more available than expected, bid on a $400K job, and won it.",
    },
    IndustryCopy {
        key: "restaurant",
        subject: "Why does cash feel tighter than sales suggest?",
        opening: "Sales are up. Somehow cash is still tight.",
        pain: "Food costs move every week. Labor scheduling is a puzzle. Some locations feel more profitable than others.",
        question: "Where is your cash actually going?",
        solution: "Real-time P&L by location tracks your actual food cost percentage daily.",
        example: "A three-location group found one site losing $4K a month, fixed vendor pricing, and was profitable in six weeks.",
    },
    IndustryCopy {
        key: "property management",
        subject: "Which properties are actually making you money?",
        opening: "Some properties feel profitable. Some don't. Which ones actually are?",
        pain: "Maintenance spikes without warning. Vacancy changes. A few properties just seem to eat cash.",
        question: "Can you see profit by property right now?",
        solution: "Real-time profitability by property shows which ones are winners and which need attention.",
        example: "One firm found two of twelve properties at breakeven or worse and added $6K a month after acting on it.",
    },
    IndustryCopy {
        key: "hvac",
        subject: "Can you afford that new truck?",
        opening: "The truck has 180K miles on it. It needs replacing. Can you afford it right now?",
        pain: "Jobs are booked three weeks out. Revenue looks good on paper. Cash is harder to see.",
        question: "What's your real cash position today?",
        solution: "Today's cash, this week's burn rate, and a 90-day cash projection in one view.",
        example: "One HVAC company saw $65K available, bought two trucks, and grew 40% in six months.",
    },
    IndustryCopy {
        key: "professional services",
        subject: "Are you actually making money on that client?",
        opening: "A big client means lots of hours. Are you actually profitable on them?",
        pain: "Some clients take far more time than others. Scope creeps. Hours get billed but true profitability isn't tracked.",
        question: "Which clients make you money and which cost you?",
        solution: "Profitability by client and project, updated in real time.",
        example: "A consulting firm found its third-biggest client was its least profitable, raised rates, and added $5K a month in margin.",
    },
    IndustryCopy {
        key: "automotive",
        subject: "Why does cash disappear faster than expected?",
        opening: "Parts are expensive. Labor costs are up. Sales look good, yet cash always feels tight.",
        pain: "Parts inventory, labor scheduling, and customer payments make cash flow a daily puzzle.",
        question: "Where is your cash actually going?",
        solution: "Daily burn rate, payables coming due, and receivables coming in, all in real time.",
        example: "One shop found $35K of parts inventory it didn't need and freed up the cash.",
    },
    IndustryCopy {
        key: "manufacturing",
        subject: "Can you afford that equipment upgrade?",
        opening: "New equipment would help production. Can you afford it without stretching too thin?",
        pain: "Material costs change. Production schedules shift. Some products are more profitable than others.",
        question: "What's your real cash position and burn rate?",
        solution: "Real-time cash flow with 90-day projections so big decisions come with confidence.",
        example: "One manufacturer saw $120K available, bought new equipment, and reached ROI in eight months.",
    },
    IndustryCopy {
        key: "healthcare",
        subject: "When will that insurance payment actually hit?",
        opening: "Receivables are out there. Some insurance, some patient pay. When does cash actually arrive?",
        pain: "Insurance delays and payment plans make revenue hard to track and cash flow harder.",
        question: "What's your real cash position today?",
        solution: "Real-time cash tracking that projects when receivables will convert to cash.",
        example: "One practice found $45K in receivables past 90 days and collected $38K within a month.",
    },
];

const SIGNATURE: &str = "\u{2014}\n{sender_name}";

const INITIAL_BODY: &str = "{first_name},

You're looking at the bank balance and the bills due, trying to do the math in your head.

\"Can I afford this hire?\"
\"Should I wait another month?\"

Every owner asks these questions. Most answer them with spreadsheets and guesswork.

We show the answer in real time: today's cash position, this week's burn rate, and a forecast of what's coming in and out.

One {industry} owner discovered $47K more cash than they thought and made the hire.

See your real-time cash flow: {cta_url}

Worth 15 minutes to stop guessing?

";

const FOLLOW_UP_1_BODY: &str = "{first_name},

Quick question.

How long does it take you to answer \"Can I afford to hire right now?\"

Spreadsheet export: two to three hours.
Real-time dashboard: three seconds.

Worth a 15-minute demo? {cta_url}

";

const FOLLOW_UP_2_BODY: &str = "{first_name},

Most owners we talk to at {company} size close the books weeks after the month ends.

By then the decisions have already been made.

A live view of cash takes the guessing out of hiring, buying, and bidding.

Here's a 15-minute walkthrough if it's useful: {cta_url}

";

const FINAL_BODY: &str = "{first_name},

I'll stop after this one.

If you're still pulling numbers into spreadsheets to figure out cash flow, there's a faster way.

15-minute demo: {cta_url}

Or ignore this and I'll leave you alone.

";

fn with_signature(body: &str) -> String {
    format!("{}{}", body, SIGNATURE)
}

fn industry_body(copy: &IndustryCopy) -> String {
    with_signature(&format!(
        "{{first_name}},\n\n{}\n\n{}\n\n{}\n\n{}\n\n{}\n\nSee your real-time cash flow: {{cta_url}}\n\n",
        copy.opening, copy.pain, copy.question, copy.solution, copy.example
    ))
}

pub(super) fn descriptors() -> Vec<TemplateDescriptor> {
    let mut out = vec![
        TemplateDescriptor::new(
            "initial.generic",
            1,
            None,
            "Can you afford to hire that new person?",
            with_signature(INITIAL_BODY),
        ),
        TemplateDescriptor::new(
            "follow_up_1.generic",
            2,
            None,
            "Re: Can you afford to hire that new person?",
            with_signature(FOLLOW_UP_1_BODY),
        ),
        TemplateDescriptor::new(
            "follow_up_2.generic",
            3,
            None,
            "Month-end is too late",
            with_signature(FOLLOW_UP_2_BODY),
        ),
        TemplateDescriptor::new(
            "final.generic",
            4,
            None,
            "Last one from me",
            with_signature(FINAL_BODY),
        ),
    ];

    out.extend(INDUSTRIES.iter().map(|copy| {
        TemplateDescriptor::new(
            format!("initial.{}", copy.key.replace(' ', "_")),
            1,
            Some(copy.key),
            copy.subject,
            industry_body(copy),
        )
    }));
    out
}
